//! Event types for the livecast event system
//!
//! Events are broadcast by the player to SSE listeners. Every variant carries
//! the UTC timestamp at which the transition happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Livecast event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LivecastEvent {
    /// A "go live" request was accepted and a fresh session is active
    SessionStarted {
        session_id: String,
        generation: Uuid,
        /// 0 when the server does not know the total yet
        expected_segments: usize,
        timestamp: DateTime<Utc>,
    },

    /// A "go live" request failed
    SessionRejected {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// New commentary segments were added to the queue
    SegmentsAppended {
        session_id: String,
        added: usize,
        total: usize,
        expected_segments: usize,
        timestamp: DateTime<Utc>,
    },

    /// A commentary segment started playing from the beginning
    SegmentStarted {
        session_id: String,
        index: usize,
        url: String,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Commentary was paused because a reply arrived
    CommentaryInterrupted {
        index: usize,
        offset_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Commentary reached the end of the known segments and waits for more
    CommentaryWaiting {
        index: usize,
        expected_segments: usize,
        timestamp: DateTime<Utc>,
    },

    /// Commentary continued from a saved resume point
    CommentaryResumed {
        index: usize,
        offset_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A reply was added to the reply queue
    ReplyQueued {
        url: String,
        pending: usize,
        timestamp: DateTime<Utc>,
    },

    /// A reply clip started playing
    ReplyStarted {
        url: String,
        /// Replies queued behind this one
        remaining: usize,
        timestamp: DateTime<Utc>,
    },

    /// A reply clip is done (played out or failed)
    ReplyFinished {
        url: String,
        failed: bool,
        timestamp: DateTime<Utc>,
    },

    /// Every segment of the session has been played
    SessionFinished {
        session_id: String,
        segments: usize,
        timestamp: DateTime<Utc>,
    },

    /// A poll against the live source failed; retried on the next tick
    SourceUnavailable {
        operation: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl LivecastEvent {
    /// Variant name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            LivecastEvent::SessionStarted { .. } => "SessionStarted",
            LivecastEvent::SessionRejected { .. } => "SessionRejected",
            LivecastEvent::SegmentsAppended { .. } => "SegmentsAppended",
            LivecastEvent::SegmentStarted { .. } => "SegmentStarted",
            LivecastEvent::CommentaryInterrupted { .. } => "CommentaryInterrupted",
            LivecastEvent::CommentaryWaiting { .. } => "CommentaryWaiting",
            LivecastEvent::CommentaryResumed { .. } => "CommentaryResumed",
            LivecastEvent::ReplyQueued { .. } => "ReplyQueued",
            LivecastEvent::ReplyStarted { .. } => "ReplyStarted",
            LivecastEvent::ReplyFinished { .. } => "ReplyFinished",
            LivecastEvent::SessionFinished { .. } => "SessionFinished",
            LivecastEvent::SourceUnavailable { .. } => "SourceUnavailable",
        }
    }

    /// Timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LivecastEvent::SessionStarted { timestamp, .. }
            | LivecastEvent::SessionRejected { timestamp, .. }
            | LivecastEvent::SegmentsAppended { timestamp, .. }
            | LivecastEvent::SegmentStarted { timestamp, .. }
            | LivecastEvent::CommentaryInterrupted { timestamp, .. }
            | LivecastEvent::CommentaryWaiting { timestamp, .. }
            | LivecastEvent::CommentaryResumed { timestamp, .. }
            | LivecastEvent::ReplyQueued { timestamp, .. }
            | LivecastEvent::ReplyStarted { timestamp, .. }
            | LivecastEvent::ReplyFinished { timestamp, .. }
            | LivecastEvent::SessionFinished { timestamp, .. }
            | LivecastEvent::SourceUnavailable { timestamp, .. } => *timestamp,
        }
    }
}

/// Which logical channel currently owns the audio output
///
/// Exactly one value holds at any instant; commentary and reply audio are
/// never audible together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    Idle,
    PlayingCommentary,
    PlayingReply,
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Idle => write!(f, "idle"),
            PlaybackMode::PlayingCommentary => write!(f, "playing_commentary"),
            PlaybackMode::PlayingReply => write!(f, "playing_reply"),
        }
    }
}
