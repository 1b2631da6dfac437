//! Error types for livecast-player
//!
//! None of these are fatal to a running session: the scheduler logs them and
//! degrades to "skip and continue".

use thiserror::Error;

/// Main error type for livecast-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Poll or request against the live source failed (retried next tick)
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Response from the live source could not be understood
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server refused to start a session
    #[error("Session rejected: {0}")]
    SessionRejected(String),

    /// Audio failed to start or ended in error
    #[error("Playback error: {0}")]
    Playback(String),

    /// Saved resume point no longer references a queued segment
    #[error("Invalid resume target: segment {index} (queue length {len})")]
    InvalidResumeTarget { index: usize, len: usize },

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// The poller task is gone; commands can no longer be delivered
    #[error("Player is shutting down")]
    Stopped,

    /// Errors bubbled up from livecast-common
    #[error(transparent)]
    Common(#[from] livecast_common::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Protocol(err.to_string())
        } else {
            Error::SourceUnavailable(err.to_string())
        }
    }
}

/// Convenience Result type using livecast-player Error
pub type Result<T> = std::result::Result<T, Error>;
