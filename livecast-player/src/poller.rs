//! Session poller
//!
//! One task owns the `InterruptionScheduler` and serializes everything that
//! touches it: the poll tick, sink completions, control commands and the
//! results of source requests. Requests run as spawned tasks so a slow
//! server never delays a completion; each result is tagged with the session
//! generation it was issued for and dropped if that session is gone.

use crate::error::{Error, Result};
use crate::playback::{AudioSink, InterruptionScheduler, SinkEvent};
use crate::source::{LiveSource, SegmentPoll, SessionInfo};
use crate::state::SharedState;
use livecast_common::events::LivecastEvent;
use livecast_common::time::now;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Control requests delivered to the poller task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerCommand {
    /// Start a new session; `None` uses the configured language
    GoLive { language: Option<String> },
    /// No further segments will be produced for the active session
    FinishSession,
    /// Silence output and exit the loop
    Shutdown,
}

/// Cloneable sender side of the poller's command channel
#[derive(Debug, Clone)]
pub struct PollerHandle {
    tx: mpsc::Sender<PollerCommand>,
}

impl PollerHandle {
    pub async fn send(&self, command: PollerCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| Error::Stopped)
    }

    pub async fn go_live(&self, language: Option<String>) -> Result<()> {
        self.send(PollerCommand::GoLive { language }).await
    }

    pub async fn finish_session(&self) -> Result<()> {
        self.send(PollerCommand::FinishSession).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(PollerCommand::Shutdown).await
    }
}

#[derive(Debug)]
enum PollResult {
    GoLive {
        request: Uuid,
        result: Result<SessionInfo>,
    },
    Segments {
        generation: Uuid,
        result: Result<SegmentPoll>,
    },
    Reply {
        generation: Uuid,
        result: Result<Option<String>>,
    },
}

/// Drives an `InterruptionScheduler` from a `LiveSource`
pub struct SessionPoller {
    source: Arc<dyn LiveSource>,
    scheduler: InterruptionScheduler,
    state: Arc<SharedState>,
    poll_interval: Duration,
    language: String,
    commands: mpsc::Receiver<PollerCommand>,
    sink_events: mpsc::UnboundedReceiver<SinkEvent>,
    results_tx: mpsc::UnboundedSender<PollResult>,
    results_rx: mpsc::UnboundedReceiver<PollResult>,
    /// Latest go-live request; older answers are ignored
    pending_go_live: Option<Uuid>,
    /// Generation whose segment/reply request is outstanding
    segments_in_flight: Option<Uuid>,
    reply_in_flight: Option<Uuid>,
}

impl SessionPoller {
    /// Create the poller and the handle used to control it
    ///
    /// `sink_events` must be the receiver paired with the sender given to
    /// `sink`.
    pub fn new(
        source: Arc<dyn LiveSource>,
        sink: Box<dyn AudioSink>,
        sink_events: mpsc::UnboundedReceiver<SinkEvent>,
        state: Arc<SharedState>,
        poll_interval: Duration,
        language: String,
    ) -> (Self, PollerHandle) {
        let (tx, commands) = mpsc::channel(32);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let scheduler = InterruptionScheduler::new(sink, state.event_tx.clone());

        let poller = Self {
            source,
            scheduler,
            state,
            poll_interval,
            language,
            commands,
            sink_events,
            results_tx,
            results_rx,
            pending_go_live: None,
            segments_in_flight: None,
            reply_in_flight: None,
        };
        (poller, PollerHandle { tx })
    }

    /// Run until `Shutdown` or every handle is dropped
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.poll_interval.as_millis() as u64, "Session poller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.on_tick(),

                Some(event) = self.sink_events.recv() => {
                    self.scheduler.on_sink_event(event);
                }

                Some(result) = self.results_rx.recv() => self.on_result(result),

                command = self.commands.recv() => match command {
                    Some(PollerCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
            }

            // Only the shared state is borrowed across the await
            let status = self.scheduler.status();
            self.state.set_status(status).await;
        }

        info!("Session poller stopping");
        self.scheduler.stop_output();
        let status = self.scheduler.status();
        self.state.set_status(status).await;
    }

    fn on_command(&mut self, command: PollerCommand) {
        match command {
            PollerCommand::GoLive { language } => {
                let language = language.unwrap_or_else(|| self.language.clone());
                self.request_go_live(language);
            }
            PollerCommand::FinishSession => self.scheduler.mark_source_complete(),
            PollerCommand::Shutdown => {}
        }
    }

    fn request_go_live(&mut self, language: String) {
        let request = Uuid::new_v4();
        if self.pending_go_live.replace(request).is_some() {
            debug!("Superseding an unanswered go-live request");
        }

        let source = Arc::clone(&self.source);
        let results = self.results_tx.clone();
        tokio::spawn(async move {
            let result = source.start_session(&language).await;
            let _ = results.send(PollResult::GoLive { request, result });
        });
    }

    fn on_tick(&mut self) {
        let Some(generation) = self.scheduler.generation() else {
            return;
        };

        if self.scheduler.needs_segments() && self.segments_in_flight != Some(generation) {
            if let Some(info) = self.scheduler.session_info() {
                self.segments_in_flight = Some(generation);
                let session_id = info.session_id.clone();
                let source = Arc::clone(&self.source);
                let results = self.results_tx.clone();
                tokio::spawn(async move {
                    let result = source.poll_segments(&session_id).await;
                    let _ = results.send(PollResult::Segments { generation, result });
                });
            }
        }

        if self.scheduler.is_live() && self.reply_in_flight != Some(generation) {
            self.reply_in_flight = Some(generation);
            let source = Arc::clone(&self.source);
            let results = self.results_tx.clone();
            tokio::spawn(async move {
                let result = source.poll_next_reply().await;
                let _ = results.send(PollResult::Reply { generation, result });
            });
        }
    }

    fn on_result(&mut self, result: PollResult) {
        match result {
            PollResult::GoLive { request, result } => {
                if self.pending_go_live != Some(request) {
                    debug!("Dropping answer to a superseded go-live request");
                    return;
                }
                self.pending_go_live = None;

                match result {
                    Ok(info) => {
                        self.scheduler.start_session(request, info);
                        // First poll right away instead of a full interval later
                        self.on_tick();
                    }
                    Err(e) => {
                        warn!("Go-live failed: {}", e);
                        self.state.broadcast_event(LivecastEvent::SessionRejected {
                            reason: e.to_string(),
                            timestamp: now(),
                        });
                    }
                }
            }

            PollResult::Segments { generation, result } => {
                if self.segments_in_flight == Some(generation) {
                    self.segments_in_flight = None;
                }
                match result {
                    Ok(poll) => {
                        self.scheduler.append_segments(generation, poll);
                    }
                    Err(e) => self.source_unavailable(generation, "poll_segments", e),
                }
            }

            PollResult::Reply { generation, result } => {
                if self.reply_in_flight == Some(generation) {
                    self.reply_in_flight = None;
                }
                match result {
                    Ok(Some(url)) => {
                        self.scheduler.enqueue_reply(generation, url);
                    }
                    Ok(None) => {}
                    Err(e) => self.source_unavailable(generation, "poll_next_reply", e),
                }
            }
        }
    }

    fn source_unavailable(&self, generation: Uuid, operation: &str, error: Error) {
        if !self.scheduler.is_current(generation) {
            return;
        }
        warn!(operation, "Live source request failed, retrying next tick: {}", error);
        self.state.broadcast_event(LivecastEvent::SourceUnavailable {
            operation: operation.to_string(),
            message: error.to_string(),
            timestamp: now(),
        });
    }
}
