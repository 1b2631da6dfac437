//! Playback engine - the single owned audio output
//!
//! **Responsibilities:**
//! - Own the one `AudioSink` and a mode tag saying which logical channel
//!   (commentary or reply) holds it
//! - Commentary channel: play at an offset, pause keeping the position, seek
//! - Reply channel: play one clip to completion or failure
//! - Drop completions of clips that are no longer current (ticket mismatch)
//!
//! The engine never picks what plays next; the scheduler does.

use super::events::{ClipOutcome, EngineEvent, SinkEvent};
use super::sink::{AudioSink, ClipTicket};
use crate::error::{Error, Result};
use livecast_common::events::PlaybackMode;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// What the output is doing right now
#[derive(Debug, Clone, PartialEq, Eq)]
enum Channel {
    Idle,
    Commentary {
        index: usize,
        url: String,
        /// Offset the clip was started at
        offset: Duration,
        ticket: ClipTicket,
    },
    Reply {
        url: String,
        ticket: ClipTicket,
    },
}

/// Position of paused commentary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PausedCommentary {
    pub index: usize,
    pub offset: Duration,
}

/// Clamp a resume offset to `[0, duration]`
///
/// With no known duration the offset passes through unchanged and the sink
/// deals with it.
pub fn clamp_offset(offset: Duration, duration: Option<Duration>) -> Duration {
    match duration {
        Some(duration) => offset.min(duration),
        None => offset,
    }
}

/// Single-output playback engine
pub struct PlaybackEngine {
    sink: Box<dyn AudioSink>,
    channel: Channel,
    next_ticket: ClipTicket,

    /// Durations learned from natural completions, keyed by URL
    learned_durations: HashMap<String, Duration>,
}

impl PlaybackEngine {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            channel: Channel::Idle,
            next_ticket: 1,
            learned_durations: HashMap::new(),
        }
    }

    /// Which channel is audible
    pub fn mode(&self) -> PlaybackMode {
        match self.channel {
            Channel::Idle => PlaybackMode::Idle,
            Channel::Commentary { .. } => PlaybackMode::PlayingCommentary,
            Channel::Reply { .. } => PlaybackMode::PlayingReply,
        }
    }

    /// Index of the audible commentary segment
    pub fn commentary_index(&self) -> Option<usize> {
        match self.channel {
            Channel::Commentary { index, .. } => Some(index),
            _ => None,
        }
    }

    /// URL of the audible reply
    pub fn reply_url(&self) -> Option<&str> {
        match &self.channel {
            Channel::Reply { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Position within the audible clip
    pub fn position(&self) -> Option<Duration> {
        match self.channel {
            Channel::Idle => None,
            _ => self.sink.position(),
        }
    }

    /// Best known duration of `url`
    pub fn segment_duration(&self, url: &str) -> Option<Duration> {
        self.sink
            .probe_duration(url)
            .or_else(|| self.learned_durations.get(url).copied())
    }

    fn take_ticket(&mut self) -> ClipTicket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    /// Play commentary segment `index` from `offset`
    ///
    /// Whatever was audible is halted first. Returns the offset actually used
    /// after clamping to the segment duration.
    pub fn play_commentary(&mut self, index: usize, url: &str, offset: Duration) -> Result<Duration> {
        self.halt_current();

        let offset = clamp_offset(offset, self.segment_duration(url));
        let ticket = self.take_ticket();
        self.sink.start(ticket, url, offset)?;

        debug!(index, url = %url, offset_ms = offset.as_millis() as u64, ticket, "Commentary playing");
        self.channel = Channel::Commentary {
            index,
            url: url.to_string(),
            offset,
            ticket,
        };
        Ok(offset)
    }

    /// Pause commentary, keeping its position
    ///
    /// Returns `None` when commentary was not audible.
    pub fn pause_commentary(&mut self) -> Option<PausedCommentary> {
        let Channel::Commentary { index, offset, .. } = self.channel else {
            return None;
        };

        let position = self.sink.halt().unwrap_or(offset);
        self.channel = Channel::Idle;
        info!(index, offset_ms = position.as_millis() as u64, "Commentary paused");
        Some(PausedCommentary {
            index,
            offset: position,
        })
    }

    /// Move the audible commentary segment to `offset`
    pub fn seek_commentary(&mut self, offset: Duration) -> Result<Duration> {
        let Channel::Commentary { index, url, .. } = self.channel.clone() else {
            return Err(Error::Playback("seek without audible commentary".to_string()));
        };
        self.play_commentary(index, &url, offset)
    }

    /// The queue re-sorted under the audible segment; follow its new index
    pub fn reindex_commentary(&mut self, new_index: usize) {
        if let Channel::Commentary { index, .. } = &mut self.channel {
            *index = new_index;
        }
    }

    /// Play one reply clip
    ///
    /// Whatever was audible is halted first; the caller pauses commentary
    /// beforehand if it wants the position back.
    pub fn play_reply(&mut self, url: &str) -> Result<()> {
        self.halt_current();

        let ticket = self.take_ticket();
        self.sink.start(ticket, url, Duration::ZERO)?;

        debug!(url = %url, ticket, "Reply playing");
        self.channel = Channel::Reply {
            url: url.to_string(),
            ticket,
        };
        Ok(())
    }

    /// Silence the output
    pub fn stop(&mut self) {
        self.halt_current();
    }

    /// Silence the output and forget everything learned about past segments
    pub fn reset(&mut self) {
        self.halt_current();
        self.learned_durations.clear();
    }

    fn halt_current(&mut self) {
        if self.channel != Channel::Idle {
            self.sink.halt();
            self.channel = Channel::Idle;
        }
    }

    /// Turn a sink completion into an engine event
    ///
    /// Completions of clips that were halted or replaced are stale and
    /// yield `None`.
    pub fn resolve(&mut self, event: SinkEvent) -> Option<EngineEvent> {
        let SinkEvent::Finished {
            ticket,
            outcome,
            position,
        } = event;

        let resolved = match &self.channel {
            Channel::Commentary {
                index,
                url,
                ticket: current,
                ..
            } if *current == ticket => {
                if outcome == ClipOutcome::Completed && position > Duration::ZERO {
                    self.learned_durations.insert(url.clone(), position);
                }
                EngineEvent::CommentaryEnded {
                    index: *index,
                    outcome,
                }
            }
            Channel::Reply {
                url,
                ticket: current,
            } if *current == ticket => EngineEvent::ReplyFinished {
                url: url.clone(),
                outcome,
            },
            _ => {
                debug!(ticket, "Dropping completion of a stale clip");
                return None;
            }
        };

        self.channel = Channel::Idle;
        Some(resolved)
    }
}
