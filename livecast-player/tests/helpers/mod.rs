//! Shared test helpers
//!
//! `ScriptedSource` stands in for the commentary server: tests decide what
//! each poll returns and inspect what was asked.

#![allow(dead_code)]

use async_trait::async_trait;
use livecast_player::error::{Error, Result};
use livecast_player::playback::{MemorySink, MemorySinkHandle, SchedulerStatus, SinkEvent};
use livecast_player::source::{LiveSource, SegmentDescriptor, SegmentPoll, SessionInfo};
use livecast_player::{PollerHandle, SessionPoller, SharedState};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const SESSION_ID: &str = "1718000000";

/// Segment descriptor as the server would name it
pub fn segment(session: &str, n: usize) -> SegmentDescriptor {
    let name = format!("live_{}_{:03}.wav", session, n);
    SegmentDescriptor::new(name.clone(), format!("http://127.0.0.1:8000/media/{}", name))
}

pub fn segments(ns: &[usize]) -> Vec<SegmentDescriptor> {
    ns.iter().map(|n| segment(SESSION_ID, *n)).collect()
}

pub fn segment_poll(ns: &[usize]) -> SegmentPoll {
    SegmentPoll {
        segments: segments(ns),
        complete: false,
    }
}

pub fn reply(name: &str) -> String {
    format!("http://127.0.0.1:8000/media/reply_batch_1_{}.wav", name)
}

#[derive(Debug, Default)]
struct Script {
    sessions: VecDeque<Result<SessionInfo>>,
    segments: Vec<SegmentDescriptor>,
    complete: bool,
    segments_unavailable: bool,
    replies: VecDeque<String>,
    languages: Vec<String>,
    segment_polls: usize,
    reply_polls: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Answer the next go-live with this session
    pub fn accept_session(&self, session_id: &str, expected_segments: usize) {
        self.script().sessions.push_back(Ok(SessionInfo {
            session_id: session_id.to_string(),
            expected_segments,
        }));
    }

    /// Answer the next go-live with a rejection
    pub fn reject_session(&self, reason: &str) {
        self.script()
            .sessions
            .push_back(Err(Error::SessionRejected(reason.to_string())));
    }

    /// Replace the cumulative segment listing
    pub fn set_segments(&self, segments: Vec<SegmentDescriptor>) {
        self.script().segments = segments;
    }

    pub fn set_complete(&self, complete: bool) {
        self.script().complete = complete;
    }

    pub fn set_segments_unavailable(&self, unavailable: bool) {
        self.script().segments_unavailable = unavailable;
    }

    pub fn push_reply(&self, url: String) {
        self.script().replies.push_back(url);
    }

    pub fn languages(&self) -> Vec<String> {
        self.script().languages.clone()
    }

    pub fn segment_polls(&self) -> usize {
        self.script().segment_polls
    }

    pub fn reply_polls(&self) -> usize {
        self.script().reply_polls
    }
}

#[async_trait]
impl LiveSource for ScriptedSource {
    async fn start_session(&self, language: &str) -> Result<SessionInfo> {
        let mut script = self.script();
        script.languages.push(language.to_string());
        script
            .sessions
            .pop_front()
            .unwrap_or_else(|| Err(Error::SessionRejected("no session scripted".to_string())))
    }

    async fn poll_segments(&self, _session_id: &str) -> Result<SegmentPoll> {
        let mut script = self.script();
        script.segment_polls += 1;
        if script.segments_unavailable {
            return Err(Error::SourceUnavailable("connection refused".to_string()));
        }
        Ok(SegmentPoll {
            segments: script.segments.clone(),
            complete: script.complete,
        })
    }

    async fn poll_next_reply(&self) -> Result<Option<String>> {
        let mut script = self.script();
        script.reply_polls += 1;
        Ok(script.replies.pop_front())
    }
}

/// A running poller wired to a scripted source and an in-memory sink
pub struct TestPlayer {
    pub source: ScriptedSource,
    pub sink: MemorySinkHandle,
    pub sink_tx: mpsc::UnboundedSender<SinkEvent>,
    pub state: Arc<SharedState>,
    pub handle: PollerHandle,
    pub task: JoinHandle<()>,
}

pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn spawn_player(source: ScriptedSource) -> TestPlayer {
    let (sink, handle_sink) = MemorySink::new();
    let (sink_tx, sink_rx) = mpsc::unbounded_channel();
    let state = Arc::new(SharedState::new());

    let (poller, handle) = SessionPoller::new(
        Arc::new(source.clone()),
        Box::new(sink),
        sink_rx,
        Arc::clone(&state),
        TEST_POLL_INTERVAL,
        "en".to_string(),
    );
    let task = tokio::spawn(poller.run());

    TestPlayer {
        source,
        sink: handle_sink,
        sink_tx,
        state,
        handle,
        task,
    }
}

impl TestPlayer {
    /// End the clip that is playing, as the audio player would
    pub fn finish_clip(&self) {
        let event = self
            .sink
            .finish(livecast_player::playback::ClipOutcome::Completed)
            .expect("a clip is playing");
        self.sink_tx.send(event).unwrap();
    }

    pub fn playing_url(&self) -> Option<String> {
        self.sink.active().map(|clip| clip.url)
    }
}

const WAIT_LIMIT: Duration = Duration::from_secs(2);

/// Re-check `check` until it holds or two seconds pass
pub async fn wait_until<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until the published status satisfies `check`
pub async fn wait_for_status<F>(state: &SharedState, what: &str, check: F) -> SchedulerStatus
where
    F: Fn(&SchedulerStatus) -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    loop {
        let status = state.get_status().await;
        if check(&status) {
            return status;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {} (last status: {:?})", what, status);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
