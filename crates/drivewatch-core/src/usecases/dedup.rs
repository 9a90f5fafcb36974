//! Time-windowed deduplication of emitted events
//!
//! Remembers when each file was last announced and suppresses repeats
//! until the TTL has elapsed. There is no background sweep: the owner calls
//! [`DedupCache::evict_expired`] once per cycle.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::FileId;

/// Default suppression window (5 minutes)
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(300);

/// Map of file id to the epoch-milliseconds of its last emission
#[derive(Debug, Clone)]
pub struct DedupCache {
    ttl_ms: i64,
    entries: HashMap<FileId, i64>,
}

impl DedupCache {
    /// Creates an empty cache with the given window
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            entries: HashMap::new(),
        }
    }

    /// Decides whether `file_id` may be emitted at `now_ms`
    ///
    /// Returns true if there is no entry or the entry is at least one TTL old,
    /// and in that case records the emission at `now_ms`. An entry stamped in
    /// the future (clock moved backwards) counts as age zero.
    pub fn should_emit(&mut self, file_id: &FileId, now_ms: i64) -> bool {
        if let Some(&last) = self.entries.get(file_id) {
            if self.age(last, now_ms) < self.ttl_ms {
                return false;
            }
        }
        self.entries.insert(file_id.clone(), now_ms);
        true
    }

    /// Drops entries at least one TTL old; returns how many were removed
    pub fn evict_expired(&mut self, now_ms: i64) -> usize {
        let before = self.entries.len();
        let ttl_ms = self.ttl_ms;
        self.entries
            .retain(|_, last| now_ms.saturating_sub(*last).max(0) < ttl_ms);
        before - self.entries.len()
    }

    /// Returns true if `file_id` has an entry (expired or not)
    pub fn contains(&self, file_id: &FileId) -> bool {
        self.entries.contains_key(file_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.max(0) as u64)
    }

    fn age(&self, last: i64, now_ms: i64) -> i64 {
        now_ms.saturating_sub(last).max(0)
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_TTL)
    }
}
