//! # Livecast Player
//!
//! Plays a virtual streamer's live commentary in order while it is still
//! being generated, interrupts it for viewer replies, and resumes the
//! commentary at the exact position it was paused.
//!
//! **Architecture:** a single poller task owns the interruption scheduler;
//! the scheduler owns the only audio output. Sources are polled over HTTP,
//! audio is rendered by an external player process.

pub mod api;
pub mod config;
pub mod error;
pub mod playback;
pub mod poller;
pub mod source;
pub mod state;

pub use error::{Error, Result};
pub use poller::{PollerCommand, PollerHandle, SessionPoller};
pub use state::SharedState;
