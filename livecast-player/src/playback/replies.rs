//! Reply Queue
//!
//! Strict FIFO of reply URLs. The head stays queued while it plays and is
//! removed only once its playback is done (completed or failed).

use std::collections::VecDeque;

/// Pending replies in arrival order
#[derive(Debug, Default)]
pub struct ReplyQueue {
    pending: VecDeque<String>,
}

impl ReplyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reply at the tail
    pub fn push(&mut self, url: String) {
        self.pending.push_back(url);
    }

    /// Reply currently at the head (playing or next to play)
    pub fn front(&self) -> Option<&str> {
        self.pending.front().map(String::as_str)
    }

    /// Remove the head after its playback finished
    pub fn complete_head(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }
}
