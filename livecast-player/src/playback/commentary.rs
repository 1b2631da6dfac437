//! Commentary Queue
//!
//! Ordered, append-only list of the active session's segments. Playback order
//! is always the lexicographic order of segment identifiers, whatever order
//! the server reported them in.

use crate::source::SegmentDescriptor;
use std::collections::HashSet;

/// Identity-based position in the queue
///
/// Appends re-sort the queue, so numeric indices can move. An anchor names a
/// segment by URL and is resolved back to an index after the append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Before every segment
    Start,
    /// At this segment
    At(String),
    /// Immediately after this segment
    After(String),
}

/// Segments of the active session
#[derive(Debug, Default)]
pub struct CommentaryQueue {
    segments: Vec<SegmentDescriptor>,

    /// URLs already queued (append idempotency)
    known_urls: HashSet<String>,

    /// 0 = unknown total
    expected_segments: usize,

    /// Out-of-band "no more segments" signal
    source_complete: bool,
}

impl CommentaryQueue {
    /// Create an empty queue expecting `expected_segments` (0 = unknown)
    pub fn new(expected_segments: usize) -> Self {
        Self {
            expected_segments,
            ..Self::default()
        }
    }

    /// Add segments, ignoring URLs already present
    ///
    /// Returns how many segments were added. The queue is re-sorted (stable)
    /// by identifier whenever something was added.
    pub fn append<I>(&mut self, descriptors: I) -> usize
    where
        I: IntoIterator<Item = SegmentDescriptor>,
    {
        let mut added = 0;
        for descriptor in descriptors {
            if self.known_urls.insert(descriptor.url.clone()) {
                self.segments.push(descriptor);
                added += 1;
            }
        }

        if added > 0 {
            self.segments
                .sort_by(|a, b| a.identifier.cmp(&b.identifier));
        }
        added
    }

    /// True once every segment of the session is queued
    pub fn is_complete(&self) -> bool {
        self.source_complete
            || (self.expected_segments > 0 && self.segments.len() >= self.expected_segments)
    }

    /// Record that the source will produce no further segments
    pub fn mark_complete(&mut self) {
        self.source_complete = true;
    }

    pub fn get(&self, index: usize) -> Option<&SegmentDescriptor> {
        self.segments.get(index)
    }

    pub fn segments(&self) -> &[SegmentDescriptor] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn expected_segments(&self) -> usize {
        self.expected_segments
    }

    /// Position of the segment with `url`
    pub fn position(&self, url: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.url == url)
    }

    /// Anchor for a cursor at `index`
    ///
    /// An index past the end (playback exhausted) anchors after the last
    /// segment, so segments appended later are played from there.
    pub fn anchor(&self, index: usize) -> Anchor {
        if let Some(segment) = self.segments.get(index) {
            Anchor::At(segment.url.clone())
        } else if let Some(last) = self.segments.last() {
            Anchor::After(last.url.clone())
        } else {
            Anchor::Start
        }
    }

    /// Current index of an anchor
    pub fn resolve(&self, anchor: &Anchor) -> usize {
        match anchor {
            Anchor::Start => 0,
            Anchor::At(url) => self.position(url).unwrap_or(self.segments.len()),
            Anchor::After(url) => self
                .position(url)
                .map(|i| i + 1)
                .unwrap_or(self.segments.len()),
        }
    }
}
