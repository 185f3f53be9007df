//! Progress heartbeat based on raw status-document bytes.
//!
//! The check is byte equality, not a semantic diff: any rewrite of the file
//! counts as progress.

/// Consecutive stalls of the same unit that end the loop.
pub const DEFAULT_STALL_LIMIT: u32 = 2;

/// Result of comparing snapshots around one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StallVerdict {
    /// The document changed.
    Progressed,
    /// The document is unchanged; the loop may continue.
    Stalled { key: String, count: u32 },
    /// The same unit stalled too often and the override is off.
    Fatal { key: String, count: u32 },
}

#[derive(Debug, Clone)]
pub struct StallDetector {
    limit: u32,
    ignore: bool,
    last_key: Option<String>,
    count: u32,
}

impl StallDetector {
    pub fn new(ignore: bool) -> Self {
        Self::with_limit(DEFAULT_STALL_LIMIT, ignore)
    }

    pub fn with_limit(limit: u32, ignore: bool) -> Self {
        Self {
            limit: limit.max(1),
            ignore,
            last_key: None,
            count: 0,
        }
    }

    /// Record one run of `key` given the snapshots taken before and after it.
    pub fn observe(&mut self, key: &str, before: &[u8], after: &[u8]) -> StallVerdict {
        if before != after {
            self.reset();
            return StallVerdict::Progressed;
        }

        if self.last_key.as_deref() == Some(key) {
            self.count = self.count.saturating_add(1);
        } else {
            self.last_key = Some(key.to_string());
            self.count = 1;
        }

        if !self.ignore && self.count >= self.limit {
            return StallVerdict::Fatal {
                key: key.to_string(),
                count: self.count,
            };
        }
        StallVerdict::Stalled {
            key: key.to_string(),
            count: self.count,
        }
    }

    pub fn reset(&mut self) {
        self.last_key = None;
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
