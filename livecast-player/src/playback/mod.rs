//! Playback: queues, the single-output engine, and the interruption scheduler

pub mod commentary;
pub mod engine;
pub mod events;
pub mod replies;
pub mod scheduler;
pub mod sink;

pub use commentary::CommentaryQueue;
pub use engine::PlaybackEngine;
pub use events::{ClipOutcome, EngineEvent, SinkEvent};
pub use replies::ReplyQueue;
pub use scheduler::{CommentaryCursor, InterruptionScheduler, SchedulerState, SchedulerStatus};
pub use sink::{
    AudioSink, ClipTicket, MemoryClip, MemorySink, MemorySinkHandle, ProcessSink, SinkCall,
};
