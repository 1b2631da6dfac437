//! Interruption scheduler behaviour tests
//!
//! Drive the scheduler synchronously with a `MemorySink` so positions and
//! completions are fully under test control.

mod helpers;

use helpers::{reply, segment, segment_poll, segments, SESSION_ID};
use livecast_common::events::{LivecastEvent, PlaybackMode};
use livecast_player::playback::{
    ClipOutcome, CommentaryCursor, InterruptionScheduler, MemorySink, MemorySinkHandle,
    SchedulerState, SinkCall,
};
use livecast_player::source::{SegmentPoll, SessionInfo};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

struct Harness {
    scheduler: InterruptionScheduler,
    sink: MemorySinkHandle,
    events: broadcast::Receiver<LivecastEvent>,
    generation: Uuid,
}

impl Harness {
    fn new(expected_segments: usize) -> Self {
        let (sink, handle) = MemorySink::new();
        let (tx, events) = broadcast::channel(256);
        let mut scheduler = InterruptionScheduler::new(Box::new(sink), tx);
        let generation = Uuid::new_v4();
        scheduler.start_session(
            generation,
            SessionInfo {
                session_id: SESSION_ID.to_string(),
                expected_segments,
            },
        );
        Self {
            scheduler,
            sink: handle,
            events,
            generation,
        }
    }

    fn append(&mut self, ns: &[usize]) -> usize {
        self.scheduler.append_segments(self.generation, segment_poll(ns))
    }

    fn reply(&mut self, name: &str) -> bool {
        self.scheduler.enqueue_reply(self.generation, reply(name))
    }

    fn finish_clip(&mut self) {
        let event = self.sink.finish(ClipOutcome::Completed).expect("a clip is playing");
        self.scheduler.on_sink_event(event);
    }

    fn fail_clip(&mut self, reason: &str) {
        let event = self
            .sink
            .finish(ClipOutcome::Failed(reason.to_string()))
            .expect("a clip is playing");
        self.scheduler.on_sink_event(event);
    }

    fn playing(&self) -> Option<String> {
        self.sink.active().map(|clip| clip.url)
    }

    fn drain_events(&mut self) -> Vec<LivecastEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn url(n: usize) -> String {
    segment(SESSION_ID, n).url
}

#[test]
fn test_late_segments_sorted_behind_playhead() {
    let mut h = Harness::new(3);

    // Segment 003 shows up alone first and starts playing
    h.append(&[3]);
    assert_eq!(h.playing(), Some(url(3)));

    // Without resetting, 001 and 002 sort before the playhead
    h.append(&[1, 2, 3]);
    assert_eq!(
        h.scheduler
            .commentary()
            .segments()
            .iter()
            .map(|s| s.url.clone())
            .collect::<Vec<_>>(),
        vec![url(1), url(2), url(3)]
    );
    assert_eq!(h.scheduler.cursor().index, 2);
    assert_eq!(h.playing(), Some(url(3)));
}

#[test]
fn test_batch_arrival_is_sorted_before_playback() {
    let mut h = Harness::new(3);
    h.scheduler.append_segments(
        h.generation,
        SegmentPoll {
            segments: vec![segment(SESSION_ID, 3), segment(SESSION_ID, 1), segment(SESSION_ID, 2)],
            complete: false,
        },
    );

    assert_eq!(h.playing(), Some(url(1)));
    h.finish_clip();
    assert_eq!(h.playing(), Some(url(2)));
    h.finish_clip();
    assert_eq!(h.playing(), Some(url(3)));
    h.finish_clip();

    assert_eq!(h.scheduler.state(), SchedulerState::Finished);
    assert_eq!(h.sink.started_urls(), vec![url(1), url(2), url(3)]);
}

#[test]
fn test_resume_restores_index_and_offset() {
    let mut h = Harness::new(5);
    h.append(&[1, 2, 3, 4, 5]);
    h.finish_clip();
    h.finish_clip();
    assert_eq!(h.playing(), Some(url(3)));

    h.sink.advance(Duration::from_millis(4200));
    h.reply("a");

    assert_eq!(h.scheduler.state(), SchedulerState::DrainingReplies);
    assert_eq!(
        h.scheduler.snapshot(),
        Some(CommentaryCursor {
            index: 2,
            offset: Duration::from_millis(4200),
        })
    );
    assert_eq!(h.playing(), Some(reply("a")));

    h.finish_clip();

    let clip = h.sink.active().unwrap();
    assert_eq!(clip.url, url(3));
    assert_eq!(clip.offset, Duration::from_millis(4200));
    assert!(h.scheduler.snapshot().is_none());

    // Next natural completion moves on to index 3
    h.finish_clip();
    assert_eq!(h.playing(), Some(url(4)));
    assert_eq!(h.scheduler.cursor().index, 3);
}

#[test]
fn test_replies_drain_fifo_before_resume() {
    let mut h = Harness::new(2);
    h.append(&[1, 2]);
    h.sink.advance(Duration::from_secs(1));

    h.reply("a");
    h.reply("b");
    h.reply("c");

    // Only the first reply captures a resume point
    assert_eq!(h.scheduler.snapshot().unwrap().offset, Duration::from_secs(1));

    let mut played = Vec::new();
    while h.scheduler.mode() == PlaybackMode::PlayingReply {
        played.push(h.playing().unwrap());
        h.finish_clip();
    }

    assert_eq!(played, vec![reply("a"), reply("b"), reply("c")]);
    assert_eq!(h.scheduler.mode(), PlaybackMode::PlayingCommentary);
    assert_eq!(h.sink.active().unwrap().offset, Duration::from_secs(1));
}

#[test]
fn test_reply_arriving_mid_drain_plays_before_resume() {
    let mut h = Harness::new(1);
    h.append(&[1]);
    h.reply("a");
    h.finish_clip();
    assert_eq!(h.playing(), Some(url(1)));

    h.reply("b");
    assert_eq!(h.playing(), Some(reply("b")));
    h.reply("c");
    h.finish_clip();
    assert_eq!(h.playing(), Some(reply("c")));
    h.finish_clip();
    assert_eq!(h.playing(), Some(url(1)));
}

#[test]
fn test_growth_waits_then_continues() {
    let mut h = Harness::new(5);
    h.append(&[1, 2, 3]);
    h.finish_clip();
    h.finish_clip();
    h.finish_clip();

    // Known segments exhausted, but 2 more are expected
    assert_eq!(h.scheduler.state(), SchedulerState::PlayingCommentary);
    assert_eq!(h.scheduler.mode(), PlaybackMode::Idle);
    assert_eq!(h.scheduler.status_line(), "Generating audio 3 / 5");
    assert!(h.scheduler.needs_segments());

    h.append(&[1, 2, 3, 4]);
    assert_eq!(h.playing(), Some(url(4)));
    h.finish_clip();

    h.append(&[1, 2, 3, 4, 5]);
    assert_eq!(h.playing(), Some(url(5)));
    h.finish_clip();

    assert_eq!(h.scheduler.state(), SchedulerState::Finished);
    assert!(!h.scheduler.is_live());
}

#[test]
fn test_append_is_idempotent() {
    let mut h = Harness::new(3);
    assert_eq!(h.append(&[1, 2]), 2);
    let before = h.sink.calls();

    assert_eq!(h.append(&[1, 2]), 0);
    assert_eq!(h.append(&[2, 1]), 0);

    assert_eq!(h.scheduler.commentary().len(), 2);
    assert_eq!(h.sink.calls(), before);
}

#[test]
fn test_new_session_discards_previous_state() {
    let mut h = Harness::new(3);
    h.append(&[1, 2]);
    h.reply("a");
    h.reply("b");
    assert!(h.scheduler.snapshot().is_some());

    let next = Uuid::new_v4();
    h.scheduler.start_session(
        next,
        SessionInfo {
            session_id: "1718000999".to_string(),
            expected_segments: 4,
        },
    );

    assert!(h.sink.active().is_none());
    assert_eq!(h.scheduler.state(), SchedulerState::Idle);
    assert!(h.scheduler.commentary().is_empty());
    assert!(h.scheduler.replies().is_empty());
    assert!(h.scheduler.snapshot().is_none());
    assert_eq!(h.scheduler.cursor(), CommentaryCursor::default());

    // Completion of the halted reply belongs to nobody now
    let stale = livecast_player::playback::SinkEvent::Finished {
        ticket: 0,
        outcome: ClipOutcome::Completed,
        position: Duration::ZERO,
    };
    h.scheduler.on_sink_event(stale);
    assert_eq!(h.scheduler.state(), SchedulerState::Idle);

    // The old generation can no longer feed the scheduler
    assert_eq!(h.scheduler.append_segments(h.generation, segment_poll(&[3])), 0);
    assert_eq!(
        h.scheduler.append_segments(
            next,
            SegmentPoll {
                segments: vec![segment("1718000999", 1)],
                complete: false,
            },
        ),
        1
    );
    assert_eq!(h.playing(), Some(segment("1718000999", 1).url));
}

#[test]
fn test_at_most_one_clip_audible() {
    let mut h = Harness::new(3);
    h.append(&[1]);
    h.sink.advance(Duration::from_millis(300));
    h.reply("a");
    h.append(&[1, 2, 3]);
    h.reply("b");
    h.finish_clip();
    h.finish_clip();
    h.finish_clip();
    h.finish_clip();
    h.finish_clip();

    assert_eq!(h.sink.overlapping_starts(), 0);
    assert!(h
        .sink
        .calls()
        .iter()
        .any(|call| matches!(call, SinkCall::Halt { .. })));
    assert_eq!(h.scheduler.state(), SchedulerState::Finished);
}

#[test]
fn test_halted_clip_completion_is_ignored() {
    let mut h = Harness::new(2);
    h.append(&[1, 2]);
    let commentary_ticket = h.sink.active().unwrap().ticket;

    h.reply("a");
    let stale = livecast_player::playback::SinkEvent::Finished {
        ticket: commentary_ticket,
        outcome: ClipOutcome::Completed,
        position: Duration::from_millis(10),
    };
    h.scheduler.on_sink_event(stale);

    // Still on the reply, cursor untouched
    assert_eq!(h.playing(), Some(reply("a")));
    assert_eq!(h.scheduler.cursor().index, 0);
}

#[test]
fn test_resume_offset_is_clamped_to_known_duration() {
    let mut h = Harness::new(1);
    h.sink.set_duration(&url(1), Duration::from_secs(3));
    h.append(&[1]);
    h.sink.advance(Duration::from_secs(5));
    h.reply("a");
    h.finish_clip();

    assert_eq!(h.sink.active().unwrap().offset, Duration::from_secs(3));
}

#[test]
fn test_late_segment_before_playhead_is_not_replayed() {
    let mut h = Harness::new(0);
    h.append(&[1, 3]);
    h.finish_clip();
    assert_eq!(h.playing(), Some(url(3)));

    h.append(&[1, 2, 3]);
    assert_eq!(h.scheduler.cursor().index, 2);
    h.finish_clip();

    assert_eq!(h.sink.started_urls(), vec![url(1), url(3)]);
    assert!(h.playing().is_none());
}

#[test]
fn test_event_sequence_for_interruption() {
    let mut h = Harness::new(1);
    h.drain_events();

    h.append(&[1]);
    h.sink.advance(Duration::from_millis(800));
    h.reply("a");
    h.finish_clip();
    h.finish_clip();

    let kinds: Vec<&str> = h.drain_events().iter().map(|e| e.event_type()).collect();
    assert_eq!(
        kinds,
        vec![
            "SegmentsAppended",
            "SegmentStarted",
            "ReplyQueued",
            "CommentaryInterrupted",
            "ReplyStarted",
            "ReplyFinished",
            "CommentaryResumed",
            "SessionFinished",
        ]
    );
}

#[test]
fn test_unknown_total_finishes_on_source_complete() {
    let mut h = Harness::new(0);
    h.scheduler
        .append_segments(h.generation, SegmentPoll { segments: segments(&[1, 2]), complete: false });
    h.finish_clip();
    h.finish_clip();
    assert_eq!(h.scheduler.state(), SchedulerState::PlayingCommentary);
    assert_eq!(h.scheduler.status_line(), "Waiting for new audio (total 2)");

    h.scheduler.mark_source_complete();
    assert_eq!(h.scheduler.state(), SchedulerState::Finished);
    assert!(!h.reply("late"));
}

#[test]
fn test_status_line_counts_against_expected_total() {
    let mut h = Harness::new(2);
    h.append(&[1]);
    assert_eq!(h.scheduler.status_line(), "Playing segment 1 / 2");

    let mut unknown = Harness::new(0);
    unknown.append(&[1, 2, 3]);
    assert_eq!(unknown.scheduler.status_line(), "Playing segment 1 / 3");
}

#[test]
fn test_reply_failures_count_as_done() {
    let mut h = Harness::new(2);
    h.append(&[1, 2]);
    h.sink.advance(Duration::from_millis(700));
    h.sink.fail_url(&reply("bad"));
    h.drain_events();

    // Fails to start: dropped from the queue, commentary comes straight back
    assert!(h.reply("bad"));
    assert!(h.scheduler.replies().is_empty());
    assert_eq!(h.scheduler.state(), SchedulerState::PlayingCommentary);
    let clip = h.sink.active().unwrap();
    assert_eq!(clip.url, url(1));
    assert_eq!(clip.offset, Duration::from_millis(700));
    assert!(h.drain_events().iter().any(|e| matches!(
        e,
        LivecastEvent::ReplyFinished { url, failed: true, .. } if *url == reply("bad")
    )));

    // Ends in error mid-playback: same as a normal finish
    h.reply("ok");
    assert_eq!(h.playing(), Some(reply("ok")));
    h.fail_clip("decoder error");

    assert!(h.scheduler.replies().is_empty());
    let clip = h.sink.active().unwrap();
    assert_eq!(clip.url, url(1));
    assert_eq!(clip.offset, Duration::from_millis(700));
    assert_eq!(h.scheduler.cursor().index, 0);
}

#[test]
fn test_commentary_error_advances_cursor() {
    let mut h = Harness::new(3);
    h.sink.fail_url(&url(3));
    h.append(&[1, 2, 3]);

    h.fail_clip("connection reset");
    assert_eq!(h.playing(), Some(url(2)));
    assert_eq!(h.scheduler.cursor().index, 1);

    // Segment 003 never starts; the queue is exhausted and complete
    h.finish_clip();
    assert!(h.playing().is_none());
    assert_eq!(h.scheduler.state(), SchedulerState::Finished);
    assert_eq!(h.sink.started_urls(), vec![url(1), url(2), url(3)]);
}

#[test]
fn test_new_session_forgets_learned_durations() {
    let mut h = Harness::new(2);
    h.append(&[1, 2]);
    h.sink.advance(Duration::from_secs(4));
    h.finish_clip();
    assert_eq!(
        h.scheduler.engine().segment_duration(&url(1)),
        Some(Duration::from_secs(4))
    );

    h.scheduler.start_session(
        Uuid::new_v4(),
        SessionInfo {
            session_id: SESSION_ID.to_string(),
            expected_segments: 2,
        },
    );
    assert!(h.scheduler.engine().segment_duration(&url(1)).is_none());
}
