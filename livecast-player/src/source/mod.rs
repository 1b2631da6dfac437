//! Live sources: where commentary segments and replies come from
//!
//! Both sources are pulled on the poller's tick. Results are cumulative for
//! segments (the caller diffs against what it already has) and at most one
//! reply per call.

pub mod http;

pub use http::HttpLiveSource;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An accepted "go live" request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    /// Opaque token issued by the server
    pub session_id: String,
    /// 0 when the total is unknown at session start
    pub expected_segments: usize,
}

/// One commentary segment as reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    /// Sort key; playback order is the lexicographic order of identifiers
    pub identifier: String,
    /// Absolute URL handed to the audio sink
    pub url: String,
}

impl SegmentDescriptor {
    pub fn new(identifier: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            url: url.into(),
        }
    }
}

/// Result of one segment poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentPoll {
    /// Every segment known so far for the session
    pub segments: Vec<SegmentDescriptor>,
    /// Out-of-band signal that no further segments will be produced
    pub complete: bool,
}

/// Segment Source + Reply Source contract
#[async_trait]
pub trait LiveSource: Send + Sync {
    /// Ask the server to start generating a new session
    async fn start_session(&self, language: &str) -> Result<SessionInfo>;

    /// Cumulative list of segments for `session_id`
    ///
    /// A session the server no longer knows about yields an empty poll.
    async fn poll_segments(&self, session_id: &str) -> Result<SegmentPoll>;

    /// Pop the next available reply, if any
    async fn poll_next_reply(&self) -> Result<Option<String>>;
}
