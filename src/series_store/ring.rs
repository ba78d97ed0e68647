// Fixed-capacity rolling history, newest first.

use crate::models::Sample;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: VecDeque<Sample>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert by timestamp and evict the oldest entries down to capacity.
    /// A sample stamped earlier than the newest (clock stepped back) lands at its
    /// ordered position; ties go in front of existing entries.
    pub fn push(&mut self, sample: Sample) {
        let at = self
            .buffer
            .partition_point(|s| s.timestamp > sample.timestamp);
        self.buffer.insert(at, sample);
        self.buffer.truncate(self.capacity);
        assert!(
            self.buffer.len() <= self.capacity,
            "ring buffer holds {} samples, capacity {}",
            self.buffer.len(),
            self.capacity
        );
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.buffer.front()
    }

    /// Oldest first.
    pub fn chronological(&self) -> Vec<Sample> {
        self.buffer.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
