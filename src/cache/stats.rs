//! Cache Statistics Module
//!
//! Counters for lookups and for entries leaving the cache, reported through
//! [`Cache::stats`](crate::cache::Cache::stats).

use serde::Serialize;

use crate::cache::RemovalReason;

// == Cache Stats ==
/// Snapshot of one cache's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// `get` calls that returned a value
    pub hits: u64,
    /// `get` calls that returned nothing (missing or expired)
    pub misses: u64,
    /// Entries pushed out by capacity pressure
    pub evictions: u64,
    /// Entries reclaimed because their lifetime ran out
    pub expirations: u64,
    /// Entries stored when the snapshot was taken
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total `get` calls.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups that hit, or 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }

    pub(crate) fn record_lookup(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    /// Counts policy-driven removals. Explicit removals and replacements are
    /// the caller's doing and are not tracked.
    pub(crate) fn record_removal(&mut self, reason: RemovalReason) {
        match reason {
            RemovalReason::Evicted => self.evictions += 1,
            RemovalReason::Expired => self.expirations += 1,
            RemovalReason::Explicit | RemovalReason::Replaced => {}
        }
    }

    pub(crate) fn with_total_entries(mut self, count: usize) -> Self {
        self.total_entries = count;
        self
    }
}
