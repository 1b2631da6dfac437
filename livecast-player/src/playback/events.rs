//! Internal playback events (not exposed via SSE)
//!
//! Sinks report clip completion as `SinkEvent`s; the engine filters out stale
//! ones and turns the rest into `EngineEvent`s for the scheduler. Clients see
//! `livecast_common::events::LivecastEvent` instead.

use super::sink::ClipTicket;
use std::time::Duration;

/// How a clip stopped on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipOutcome {
    /// Played to the end
    Completed,
    /// Failed to play or ended in error
    Failed(String),
}

impl ClipOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ClipOutcome::Failed(_))
    }
}

/// Sink → engine notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// The clip started with `ticket` is no longer playing
    ///
    /// Never sent for clips stopped through `AudioSink::halt`.
    Finished {
        ticket: ClipTicket,
        outcome: ClipOutcome,
        /// Playback position when the clip stopped
        position: Duration,
    },
}

/// Engine → scheduler notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The commentary channel's segment stopped (naturally or in error)
    CommentaryEnded { index: usize, outcome: ClipOutcome },

    /// A reply clip is done; failures count as done
    ReplyFinished { url: String, outcome: ClipOutcome },
}
