//! Bounded FIFO of accepted output chunks.
//!
//! Written by the reader thread, drained by async consumers; callers hold the
//! surrounding lock. Overflow evicts the oldest entry: bounded memory is
//! preferred over completeness, and the loss is silent but observable.

use std::collections::VecDeque;

use chatbridge_types::OUTPUT_QUEUE_CAPACITY;

#[derive(Debug)]
pub struct OutputQueue {
    entries: VecDeque<String>,
    capacity: usize,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::with_capacity(OUTPUT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, chunk: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(chunk);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drain whole chunks up to `limit` characters, preserving order.
    ///
    /// A chunk that would push the combined payload over the limit is put
    /// back for the next call. A single chunk that alone exceeds the limit
    /// is returned unsplit once the budget is fresh, never truncated.
    pub fn drain_up_to(&mut self, limit: usize) -> Option<String> {
        let mut combined = String::new();
        let mut combined_chars = 0;
        while let Some(chunk) = self.entries.pop_front() {
            let chunk_chars = chunk.chars().count();
            if combined_chars != 0 && combined_chars + chunk_chars > limit {
                self.entries.push_front(chunk);
                break;
            }
            combined.push_str(&chunk);
            combined_chars += chunk_chars;
            if combined_chars >= limit {
                break;
            }
        }

        let trimmed = combined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl Default for OutputQueue {
    fn default() -> Self {
        Self::new()
    }
}
