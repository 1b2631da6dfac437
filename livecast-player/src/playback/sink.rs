//! Audio sinks
//!
//! A sink makes exactly one clip audible at a time. It never decides what to
//! play; the engine tells it. Natural completion (or failure) of a clip is
//! reported on the event channel as `SinkEvent::Finished`, tagged with the
//! ticket the clip was started with.

use super::events::{ClipOutcome, SinkEvent};
use crate::error::{Error, Result};
use livecast_common::time::format_seconds;
use std::collections::{HashMap, HashSet};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Identifies one clip start; completions carry it back
pub type ClipTicket = u64;

/// Output device abstraction driven by the playback engine
pub trait AudioSink: Send {
    /// Start playing `url` at `offset`, replacing whatever was playing
    fn start(&mut self, ticket: ClipTicket, url: &str, offset: Duration) -> Result<()>;

    /// Stop the current clip without a completion event
    ///
    /// Returns the position reached, or `None` if nothing was playing.
    fn halt(&mut self) -> Option<Duration>;

    /// Position within the current clip
    fn position(&self) -> Option<Duration>;

    /// Clip duration if the sink can tell without playing it
    fn probe_duration(&self, _url: &str) -> Option<Duration> {
        None
    }
}

// ============================================================================
// ProcessSink
// ============================================================================

struct RunningClip {
    ticket: ClipTicket,
    started: Instant,
    offset: Duration,
    cancel: oneshot::Sender<()>,
}

/// Sink that spawns an external player process per clip
///
/// Resume offsets are passed through the `{offset}` placeholder. Positions
/// are wall-clock based, which is precise to a few tens of milliseconds.
pub struct ProcessSink {
    program: String,
    args: Vec<String>,
    events: mpsc::UnboundedSender<SinkEvent>,
    running: Option<RunningClip>,
}

impl ProcessSink {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        events: mpsc::UnboundedSender<SinkEvent>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            events,
            running: None,
        }
    }

    /// Player arguments with placeholders substituted
    pub fn render_args(&self, url: &str, offset: Duration) -> Vec<String> {
        let offset = format_seconds(offset);
        self.args
            .iter()
            .map(|arg| arg.replace("{url}", url).replace("{offset}", &offset))
            .collect()
    }
}

impl AudioSink for ProcessSink {
    fn start(&mut self, ticket: ClipTicket, url: &str, offset: Duration) -> Result<()> {
        self.halt();

        let args = self.render_args(url, offset);
        debug!(ticket, program = %self.program, ?args, "Spawning player");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Playback(format!("failed to spawn {}: {}", self.program, e)))?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let events = self.events.clone();
        let started = Instant::now();

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let outcome = match status {
                        Ok(status) if status.success() => ClipOutcome::Completed,
                        Ok(status) => ClipOutcome::Failed(format!("player exited with {}", status)),
                        Err(e) => ClipOutcome::Failed(format!("failed to wait for player: {}", e)),
                    };
                    let _ = events.send(SinkEvent::Finished {
                        ticket,
                        outcome,
                        position: offset + started.elapsed(),
                    });
                }
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        warn!(ticket, "Failed to stop player: {}", e);
                    }
                }
            }
        });

        self.running = Some(RunningClip {
            ticket,
            started,
            offset,
            cancel: cancel_tx,
        });
        Ok(())
    }

    fn halt(&mut self) -> Option<Duration> {
        let clip = self.running.take()?;
        debug!(ticket = clip.ticket, "Halting player");
        let position = clip.offset + clip.started.elapsed();
        let _ = clip.cancel.send(());
        Some(position)
    }

    fn position(&self) -> Option<Duration> {
        self.running
            .as_ref()
            .map(|clip| clip.offset + clip.started.elapsed())
    }
}

// ============================================================================
// MemorySink
// ============================================================================

/// Call recorded by `MemorySink`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Start {
        ticket: ClipTicket,
        url: String,
        offset: Duration,
    },
    Halt {
        ticket: ClipTicket,
        position: Duration,
    },
}

/// Clip currently "audible" in a `MemorySink`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryClip {
    pub ticket: ClipTicket,
    pub url: String,
    pub offset: Duration,
    pub elapsed: Duration,
}

impl MemoryClip {
    pub fn position(&self) -> Duration {
        self.offset + self.elapsed
    }
}

#[derive(Debug, Default)]
struct MemorySinkInner {
    calls: Vec<SinkCall>,
    active: Option<MemoryClip>,
    durations: HashMap<String, Duration>,
    failing_urls: HashSet<String>,
    /// Starts issued while another clip was still audible
    overlapping_starts: usize,
}

/// Sink that plays nothing and lets the owner steer time by hand
///
/// Positions only move when the handle advances them, which makes
/// interruption/resume behavior reproducible.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemorySinkInner>>,
}

/// Inspection/steering handle for a `MemorySink` owned by an engine
#[derive(Debug, Clone)]
pub struct MemorySinkHandle {
    inner: Arc<Mutex<MemorySinkInner>>,
}

fn lock(inner: &Mutex<MemorySinkInner>) -> MutexGuard<'_, MemorySinkInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySink {
    pub fn new() -> (Self, MemorySinkHandle) {
        let inner = Arc::new(Mutex::new(MemorySinkInner::default()));
        let handle = MemorySinkHandle {
            inner: Arc::clone(&inner),
        };
        (Self { inner }, handle)
    }
}

impl AudioSink for MemorySink {
    fn start(&mut self, ticket: ClipTicket, url: &str, offset: Duration) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.active.is_some() {
            inner.overlapping_starts += 1;
        }
        inner.calls.push(SinkCall::Start {
            ticket,
            url: url.to_string(),
            offset,
        });
        if inner.failing_urls.contains(url) {
            inner.active = None;
            return Err(Error::Playback(format!("cannot play {}", url)));
        }
        inner.active = Some(MemoryClip {
            ticket,
            url: url.to_string(),
            offset,
            elapsed: Duration::ZERO,
        });
        Ok(())
    }

    fn halt(&mut self) -> Option<Duration> {
        let mut inner = lock(&self.inner);
        let clip = inner.active.take()?;
        let position = clip.position();
        inner.calls.push(SinkCall::Halt {
            ticket: clip.ticket,
            position,
        });
        Some(position)
    }

    fn position(&self) -> Option<Duration> {
        lock(&self.inner).active.as_ref().map(MemoryClip::position)
    }

    fn probe_duration(&self, url: &str) -> Option<Duration> {
        lock(&self.inner).durations.get(url).copied()
    }
}

impl MemorySinkHandle {
    /// Every start/halt so far
    pub fn calls(&self) -> Vec<SinkCall> {
        lock(&self.inner).calls.clone()
    }

    /// URLs passed to `start`, in order
    pub fn started_urls(&self) -> Vec<String> {
        lock(&self.inner)
            .calls
            .iter()
            .filter_map(|call| match call {
                SinkCall::Start { url, .. } => Some(url.clone()),
                SinkCall::Halt { .. } => None,
            })
            .collect()
    }

    /// Number of starts that found another clip still playing
    pub fn overlapping_starts(&self) -> usize {
        lock(&self.inner).overlapping_starts
    }

    /// Clip currently playing
    pub fn active(&self) -> Option<MemoryClip> {
        lock(&self.inner).active.clone()
    }

    /// Move the playing clip's position forward
    pub fn advance(&self, elapsed: Duration) {
        if let Some(clip) = lock(&self.inner).active.as_mut() {
            clip.elapsed += elapsed;
        }
    }

    /// Make `probe_duration` report `duration` for `url`
    pub fn set_duration(&self, url: &str, duration: Duration) {
        lock(&self.inner).durations.insert(url.to_string(), duration);
    }

    /// Make every future `start` of `url` fail
    pub fn fail_url(&self, url: &str) {
        lock(&self.inner).failing_urls.insert(url.to_string());
    }

    /// End the playing clip and produce the event a real sink would send
    pub fn finish(&self, outcome: ClipOutcome) -> Option<SinkEvent> {
        let clip = lock(&self.inner).active.take()?;
        Some(SinkEvent::Finished {
            ticket: clip.ticket,
            outcome,
            position: clip.position(),
        })
    }
}
