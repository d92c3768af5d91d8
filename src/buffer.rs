//! Volatile, capacity-bounded buffer of the most recent turns.

use std::collections::VecDeque;

/// Largest accepted buffer capacity.
pub const MAX_SHORT_TERM_CAPACITY: usize = 1_000_000;

/// FIFO of recent dialogue texts. Oldest entries are evicted first.
///
/// Not persisted: a restarted process starts with an empty buffer while the
/// relational log keeps the full history.
#[derive(Debug, Clone)]
pub struct ShortTermBuffer {
    entries: VecDeque<String>,
    capacity: usize,
}

impl ShortTermBuffer {
    /// Create an empty buffer holding at most `capacity` entries (minimum 1).
    ///
    /// Storage grows with use; nothing is reserved up front.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append `text`, returning the entry evicted to make room, if any.
    pub fn push(&mut self, text: impl Into<String>) -> Option<String> {
        self.entries.push_back(text.into());
        if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Contents oldest first.
    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
