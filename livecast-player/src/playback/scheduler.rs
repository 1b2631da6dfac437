//! Interruption Scheduler
//!
//! Decides at every trigger what should be audible. It owns the commentary
//! queue, the reply queue, the commentary cursor, the paused-commentary
//! snapshot and the playback engine, and is driven by exactly three kinds of
//! input: session start, source data (segments, replies, completion), and
//! engine completions. All mutation happens on the caller's task.
//!
//! States:
//! - `Idle`: no session, or a session with no segment yet
//! - `PlayingCommentary`: commentary audible, or waiting at the end of the
//!   known segments for more to arrive
//! - `DrainingReplies`: replies play back to back until the queue is empty
//! - `Finished`: every segment of a complete session has been played

use super::commentary::CommentaryQueue;
use super::engine::PlaybackEngine;
use super::events::{ClipOutcome, EngineEvent, SinkEvent};
use super::replies::ReplyQueue;
use super::sink::AudioSink;
use crate::error::Error;
use crate::source::{SegmentPoll, SessionInfo};
use livecast_common::events::{LivecastEvent, PlaybackMode};
use livecast_common::time::{duration_to_millis, now};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    PlayingCommentary,
    DrainingReplies,
    Finished,
}

/// Current segment index and intra-segment offset
///
/// `index == queue length` means playback has consumed every known segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentaryCursor {
    pub index: usize,
    pub offset: Duration,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    info: SessionInfo,
    generation: Uuid,
}

/// Cursor as reported by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CursorStatus {
    pub index: usize,
    pub offset_ms: u64,
}

impl From<CommentaryCursor> for CursorStatus {
    fn from(cursor: CommentaryCursor) -> Self {
        Self {
            index: cursor.index,
            offset_ms: duration_to_millis(cursor.offset),
        }
    }
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub session_id: Option<String>,
    pub generation: Option<Uuid>,
    pub live: bool,
    pub state: SchedulerState,
    pub mode: PlaybackMode,
    pub expected_segments: usize,
    pub queued_segments: usize,
    pub cursor: CursorStatus,
    /// Position within the audible clip
    pub position_ms: Option<u64>,
    pub current_reply: Option<String>,
    pub snapshot: Option<CursorStatus>,
    pub pending_replies: Vec<String>,
    pub status_line: String,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            session_id: None,
            generation: None,
            live: false,
            state: SchedulerState::Idle,
            mode: PlaybackMode::Idle,
            expected_segments: 0,
            queued_segments: 0,
            cursor: CommentaryCursor::default().into(),
            position_ms: None,
            current_reply: None,
            snapshot: None,
            pending_replies: Vec::new(),
            status_line: "Idle".to_string(),
        }
    }
}

/// The playback scheduling and interruption/resume state machine
pub struct InterruptionScheduler {
    engine: PlaybackEngine,
    session: Option<ActiveSession>,
    commentary: CommentaryQueue,
    replies: ReplyQueue,
    cursor: CommentaryCursor,
    /// Resume point captured when a reply interrupted audible commentary
    snapshot: Option<CommentaryCursor>,
    state: SchedulerState,
    events: broadcast::Sender<LivecastEvent>,
}

impl InterruptionScheduler {
    pub fn new(sink: Box<dyn AudioSink>, events: broadcast::Sender<LivecastEvent>) -> Self {
        Self {
            engine: PlaybackEngine::new(sink),
            session: None,
            commentary: CommentaryQueue::default(),
            replies: ReplyQueue::new(),
            cursor: CommentaryCursor::default(),
            snapshot: None,
            state: SchedulerState::Idle,
            events,
        }
    }

    fn emit(&self, event: LivecastEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn session_id(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.info.session_id.clone())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn mode(&self) -> PlaybackMode {
        self.engine.mode()
    }

    pub fn cursor(&self) -> CommentaryCursor {
        self.cursor
    }

    pub fn snapshot(&self) -> Option<CommentaryCursor> {
        self.snapshot
    }

    pub fn commentary(&self) -> &CommentaryQueue {
        &self.commentary
    }

    pub fn replies(&self) -> &ReplyQueue {
        &self.replies
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn session_info(&self) -> Option<&SessionInfo> {
        self.session.as_ref().map(|s| &s.info)
    }

    /// Generation of the active session
    pub fn generation(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.generation)
    }

    /// Is `generation` the active session?
    pub fn is_current(&self, generation: Uuid) -> bool {
        self.generation() == Some(generation)
    }

    /// A session is started and not finished; gates reply polling
    pub fn is_live(&self) -> bool {
        self.session.is_some() && self.state != SchedulerState::Finished
    }

    /// Segment polling continues until the queue is complete
    pub fn needs_segments(&self) -> bool {
        self.is_live() && !self.commentary.is_complete()
    }

    /// Index of the segment that plays after the current one
    pub fn next_index(&self) -> usize {
        (self.cursor.index + 1).min(self.commentary.len())
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    /// Replace whatever session was active with a fresh one
    ///
    /// Silences the output and discards the old queue, cursor, snapshot,
    /// pending replies and learned segment durations.
    pub fn start_session(&mut self, generation: Uuid, info: SessionInfo) {
        self.engine.reset();

        if let Some(old) = &self.session {
            info!(
                old_session = %old.info.session_id,
                new_session = %info.session_id,
                dropped_replies = self.replies.len(),
                "Replacing live session"
            );
        }

        self.commentary = CommentaryQueue::new(info.expected_segments);
        self.replies.clear();
        self.snapshot = None;
        self.cursor = CommentaryCursor::default();
        self.state = SchedulerState::Idle;

        info!(
            session_id = %info.session_id,
            expected_segments = info.expected_segments,
            "Live session started"
        );
        self.emit(LivecastEvent::SessionStarted {
            session_id: info.session_id.clone(),
            generation,
            expected_segments: info.expected_segments,
            timestamp: now(),
        });
        self.session = Some(ActiveSession { info, generation });
    }

    /// Feed a segment poll
    ///
    /// Returns how many segments were new. Polls from a superseded session
    /// are ignored.
    pub fn append_segments(&mut self, generation: Uuid, poll: SegmentPoll) -> usize {
        if !self.is_current(generation) {
            debug!("Dropping segment poll of a superseded session");
            return 0;
        }
        if self.state == SchedulerState::Finished {
            return 0;
        }

        let cursor_anchor = self.commentary.anchor(self.cursor.index);
        let snapshot_anchor = self.snapshot.map(|s| self.commentary.anchor(s.index));

        let added = self.commentary.append(poll.segments);
        if poll.complete {
            debug!("Source reports no further segments");
            self.commentary.mark_complete();
        }

        if added > 0 {
            let index = self.commentary.resolve(&cursor_anchor);
            if index != self.cursor.index {
                warn!(
                    old_index = self.cursor.index,
                    new_index = index,
                    "Late segment sorted before the playhead and will not be played"
                );
                self.cursor.index = index;
                self.engine.reindex_commentary(index);
            }
            if let (Some(snapshot), Some(anchor)) = (self.snapshot.as_mut(), snapshot_anchor) {
                snapshot.index = self.commentary.resolve(&anchor);
            }

            info!(
                added,
                total = self.commentary.len(),
                expected = self.commentary.expected_segments(),
                "Received new audio"
            );
            self.emit(LivecastEvent::SegmentsAppended {
                session_id: self.session_id(),
                added,
                total: self.commentary.len(),
                expected_segments: self.commentary.expected_segments(),
                timestamp: now(),
            });
        }

        self.continue_after_growth();
        added
    }

    /// Out-of-band signal that the source will produce no more segments
    pub fn mark_source_complete(&mut self) {
        if !self.is_live() {
            return;
        }
        info!(segments = self.commentary.len(), "Segment source marked complete");
        self.commentary.mark_complete();
        self.continue_after_growth();
    }

    /// Start or un-stall commentary after the queue grew or completed
    fn continue_after_growth(&mut self) {
        let stalled = match self.state {
            SchedulerState::Idle => true,
            SchedulerState::PlayingCommentary => self.engine.mode() == PlaybackMode::Idle,
            // Draining picks new segments up when it resumes
            SchedulerState::DrainingReplies | SchedulerState::Finished => false,
        };

        if stalled
            && (self.cursor.index < self.commentary.len() || self.commentary.is_complete())
        {
            self.play_from_cursor();
        }
    }

    fn finish(&mut self) {
        self.engine.stop();
        self.snapshot = None;
        self.state = SchedulerState::Finished;

        info!(segments = self.commentary.len(), "Live session finished");
        self.emit(LivecastEvent::SessionFinished {
            session_id: self.session_id(),
            segments: self.commentary.len(),
            timestamp: now(),
        });
    }

    // ------------------------------------------------------------------------
    // Commentary
    // ------------------------------------------------------------------------

    /// Play the segment under the cursor from its start
    ///
    /// Segments that fail to start are skipped. At the end of the queue the
    /// session either finishes (complete) or waits for more segments.
    fn play_from_cursor(&mut self) {
        loop {
            let len = self.commentary.len();
            if self.cursor.index >= len {
                self.cursor = CommentaryCursor {
                    index: len,
                    offset: Duration::ZERO,
                };

                if self.commentary.is_complete() {
                    self.finish();
                } else if len == 0 {
                    self.state = SchedulerState::Idle;
                } else {
                    self.state = SchedulerState::PlayingCommentary;
                    debug!(index = len, "Waiting for more segments");
                    self.emit(LivecastEvent::CommentaryWaiting {
                        index: len,
                        expected_segments: self.commentary.expected_segments(),
                        timestamp: now(),
                    });
                }
                return;
            }

            let index = self.cursor.index;
            let url = match self.commentary.get(index) {
                Some(segment) => segment.url.clone(),
                None => return,
            };

            match self.engine.play_commentary(index, &url, Duration::ZERO) {
                Ok(_) => {
                    self.cursor.offset = Duration::ZERO;
                    self.state = SchedulerState::PlayingCommentary;
                    info!("Playing segment {} / {}", index + 1, self.segment_total());
                    self.emit(LivecastEvent::SegmentStarted {
                        session_id: self.session_id(),
                        index,
                        url,
                        total: len,
                        timestamp: now(),
                    });
                    return;
                }
                Err(e) => {
                    warn!(index, url = %url, "Skipping segment that failed to start: {}", e);
                    self.cursor.index += 1;
                }
            }
        }
    }

    fn on_commentary_ended(&mut self, outcome: ClipOutcome) {
        if self.state != SchedulerState::PlayingCommentary {
            debug!(state = ?self.state, "Ignoring commentary end outside commentary playback");
            return;
        }

        if let ClipOutcome::Failed(reason) = &outcome {
            warn!(index = self.cursor.index, "Segment ended in error, advancing: {}", reason);
        }

        self.cursor.index = self.next_index();
        self.cursor.offset = Duration::ZERO;
        self.play_from_cursor();
    }

    // ------------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------------

    /// Queue a reply; interrupts commentary if not already draining
    ///
    /// Returns false when the reply was dropped (stale or finished session).
    pub fn enqueue_reply(&mut self, generation: Uuid, url: String) -> bool {
        if !self.is_current(generation) {
            debug!(url = %url, "Dropping reply of a superseded session");
            return false;
        }
        if self.state == SchedulerState::Finished {
            debug!(url = %url, "Dropping reply after session finished");
            return false;
        }

        self.replies.push(url.clone());
        info!("Queued live reply ({} pending)", self.replies.len());
        self.emit(LivecastEvent::ReplyQueued {
            url,
            pending: self.replies.len(),
            timestamp: now(),
        });

        match self.state {
            // Picked up by the running drain; no second pause capture
            SchedulerState::DrainingReplies => {}
            SchedulerState::Idle | SchedulerState::PlayingCommentary => self.begin_draining(),
            SchedulerState::Finished => {}
        }
        true
    }

    fn begin_draining(&mut self) {
        self.snapshot = self.engine.pause_commentary().map(|paused| CommentaryCursor {
            index: self.cursor.index,
            offset: paused.offset,
        });

        if let Some(snapshot) = self.snapshot {
            self.cursor.offset = snapshot.offset;
            self.emit(LivecastEvent::CommentaryInterrupted {
                index: snapshot.index,
                offset_ms: duration_to_millis(snapshot.offset),
                timestamp: now(),
            });
        }

        self.state = SchedulerState::DrainingReplies;
        self.play_next_reply();
    }

    /// Play the head reply, or resume commentary once none are left
    fn play_next_reply(&mut self) {
        while let Some(url) = self.replies.front().map(str::to_string) {
            match self.engine.play_reply(&url) {
                Ok(()) => {
                    let remaining = self.replies.len() - 1;
                    info!("Playing live reply ({} remaining)", remaining);
                    self.emit(LivecastEvent::ReplyStarted {
                        url,
                        remaining,
                        timestamp: now(),
                    });
                    return;
                }
                Err(e) => {
                    warn!(url = %url, "Reply failed to start, treating as done: {}", e);
                    self.replies.complete_head();
                    self.emit(LivecastEvent::ReplyFinished {
                        url,
                        failed: true,
                        timestamp: now(),
                    });
                }
            }
        }

        self.resume_commentary();
    }

    fn on_reply_finished(&mut self, url: String, outcome: ClipOutcome) {
        if self.state != SchedulerState::DrainingReplies {
            debug!(state = ?self.state, "Ignoring reply completion outside draining");
            return;
        }

        match self.replies.complete_head() {
            Some(head) if head == url => {}
            other => warn!(expected = ?other, finished = %url, "Reply queue head mismatch"),
        }
        if let ClipOutcome::Failed(reason) = &outcome {
            warn!(url = %url, "Reply playback failed: {}", reason);
        }

        self.emit(LivecastEvent::ReplyFinished {
            url,
            failed: outcome.is_failure(),
            timestamp: now(),
        });
        self.play_next_reply();
    }

    /// Hand the output back to commentary after draining
    fn resume_commentary(&mut self) {
        info!("Resuming live commentary");
        self.state = SchedulerState::PlayingCommentary;

        let Some(snapshot) = self.snapshot.take() else {
            // Nothing was audible when the first reply arrived
            self.play_from_cursor();
            return;
        };

        let Some(url) = self.commentary.get(snapshot.index).map(|s| s.url.clone()) else {
            let err = Error::InvalidResumeTarget {
                index: snapshot.index,
                len: self.commentary.len(),
            };
            warn!("{}, continuing from cursor", err);
            self.play_from_cursor();
            return;
        };

        match self.engine.play_commentary(snapshot.index, &url, snapshot.offset) {
            Ok(offset) => {
                self.cursor = CommentaryCursor {
                    index: snapshot.index,
                    offset,
                };
                info!(
                    index = snapshot.index,
                    offset_ms = duration_to_millis(offset),
                    "Playing segment {} / {}",
                    snapshot.index + 1,
                    self.segment_total()
                );
                self.emit(LivecastEvent::CommentaryResumed {
                    index: snapshot.index,
                    offset_ms: duration_to_millis(offset),
                    timestamp: now(),
                });
            }
            Err(e) => {
                warn!(index = snapshot.index, "Resume failed, treating segment as ended: {}", e);
                self.cursor = CommentaryCursor {
                    index: snapshot.index + 1,
                    offset: Duration::ZERO,
                };
                self.play_from_cursor();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Engine completions
    // ------------------------------------------------------------------------

    /// Feed a sink completion
    pub fn on_sink_event(&mut self, event: SinkEvent) {
        let Some(event) = self.engine.resolve(event) else {
            return;
        };

        match event {
            EngineEvent::CommentaryEnded { outcome, .. } => self.on_commentary_ended(outcome),
            EngineEvent::ReplyFinished { url, outcome } => self.on_reply_finished(url, outcome),
        }
    }

    /// Silence output without touching session state (shutdown)
    pub fn stop_output(&mut self) {
        self.engine.stop();
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    /// Announced segment count, or the queued count when none was announced
    fn segment_total(&self) -> usize {
        match self.commentary.expected_segments() {
            0 => self.commentary.len(),
            expected => expected,
        }
    }

    /// Human readable one-line status
    pub fn status_line(&self) -> String {
        let len = self.commentary.len();
        let expected = self.commentary.expected_segments();

        match self.state {
            SchedulerState::Idle if self.session.is_none() => "Idle".to_string(),
            SchedulerState::Idle if expected > 0 => {
                format!("Generating audio {} / {}", len, expected)
            }
            SchedulerState::Idle => {
                "Session queued. Waiting for generation...".to_string()
            }
            SchedulerState::PlayingCommentary if self.engine.mode() == PlaybackMode::PlayingCommentary => {
                format!("Playing segment {} / {}", self.cursor.index + 1, self.segment_total())
            }
            SchedulerState::PlayingCommentary if expected > 0 => {
                format!("Generating audio {} / {}", len, expected)
            }
            SchedulerState::PlayingCommentary => {
                format!("Waiting for new audio (total {})", len)
            }
            SchedulerState::DrainingReplies => format!(
                "Playing live reply ({} remaining)",
                self.replies.len().saturating_sub(1)
            ),
            SchedulerState::Finished => "Live session finished.".to_string(),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            session_id: self.session.as_ref().map(|s| s.info.session_id.clone()),
            generation: self.generation(),
            live: self.is_live(),
            state: self.state,
            mode: self.engine.mode(),
            expected_segments: self.commentary.expected_segments(),
            queued_segments: self.commentary.len(),
            cursor: self.cursor.into(),
            position_ms: self.engine.position().map(duration_to_millis),
            current_reply: self.engine.reply_url().map(str::to_string),
            snapshot: self.snapshot.map(CursorStatus::from),
            pending_replies: self.replies.iter().map(str::to_string).collect(),
            status_line: self.status_line(),
        }
    }
}
