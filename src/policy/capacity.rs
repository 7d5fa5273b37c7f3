//! Capacity Policy
//!
//! Bounds the number of entries; the least recently used entry is evicted
//! first.

use std::hash::Hash;

use tracing::debug;

use crate::cache::{Entry, EntryStore, LruTracker};
use crate::clock::Timestamp;
use crate::error::{CacheError, Result};
use crate::policy::EvictionPolicy;

// == Capacity Policy ==
/// LRU eviction over a fixed item count.
#[derive(Debug)]
pub struct CapacityPolicy<K> {
    capacity: usize,
    lru: LruTracker<K>,
}

impl<K: Clone + Hash + Eq> CapacityPolicy<K> {
    /// Creates a policy holding at most `capacity` entries.
    ///
    /// A capacity of zero is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidConfiguration(
                "capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            lru: LruTracker::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K, V> EvictionPolicy<K, V> for CapacityPolicy<K>
where
    K: Clone + Hash + Eq + Send,
{
    fn on_insert(&mut self, _store: &mut EntryStore<K, V>, key: &K, _now: Timestamp) -> Vec<K> {
        self.lru.touch(key);

        let mut victims = Vec::new();
        while self.lru.len() > self.capacity {
            match self.lru.evict_oldest() {
                Some(victim) => victims.push(victim),
                None => break,
            }
        }
        if !victims.is_empty() {
            debug!(
                evicted = victims.len(),
                capacity = self.capacity,
                "LRU capacity exceeded"
            );
        }
        victims
    }

    fn on_access(&mut self, _store: &mut EntryStore<K, V>, key: &K, _now: Timestamp) -> bool {
        self.lru.touch(key);
        true
    }

    fn on_remove(&mut self, key: &K) {
        self.lru.remove(key);
    }

    fn on_clear(&mut self) {
        self.lru.clear();
    }

    fn is_expired(&self, _entry: &Entry<V>, _now: Timestamp) -> bool {
        false
    }

    fn sweep_candidates(&self, _store: &EntryStore<K, V>, _now: Timestamp) -> Vec<K> {
        Vec::new()
    }
}
