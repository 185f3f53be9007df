//! Bounded rolling buffer of recent output lines.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Lines kept for the live preview when nothing else is configured.
pub const DEFAULT_LAST_LINES: usize = 3;

/// Thread-safe buffer of the last `capacity` non-empty, trimmed lines.
///
/// Readers push concurrently; a ticker takes snapshots. Lines from different
/// streams interleave in arrival order only.
#[derive(Debug)]
pub struct LastLines {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl LastLines {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.to_string());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for LastLines {
    fn default() -> Self {
        Self::new(DEFAULT_LAST_LINES)
    }
}
