//! # Livecast Common Library
//!
//! Shared code for the livecast services including:
//! - Event types (LivecastEvent enum)
//! - Configuration loading and config file resolution
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::LivecastEvent;
