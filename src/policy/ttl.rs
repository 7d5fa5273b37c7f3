//! Cache-wide TTL Policies
//!
//! Every entry gets the same lifetime. [`AbsoluteTtlPolicy`] fixes the
//! deadline at insertion; [`SlidingTtlPolicy`] pushes it forward on each
//! `get`.

use std::hash::Hash;
use std::time::Duration;

use crate::cache::{Entry, EntryStore, ExpiryIndex};
use crate::clock::Timestamp;
use crate::error::Result;
use crate::policy::{validate_ttl, EvictionPolicy};

#[derive(Debug)]
struct TtlSchedule<K> {
    ttl: Duration,
    index: ExpiryIndex<K>,
}

impl<K: Clone + Hash + Eq> TtlSchedule<K> {
    fn new(ttl: Duration) -> Result<Self> {
        validate_ttl(ttl)?;
        Ok(Self {
            ttl,
            index: ExpiryIndex::new(),
        })
    }

    /// Sets the deadline of `key` to `now + ttl`.
    fn stamp<V>(&mut self, store: &mut EntryStore<K, V>, key: &K, now: Timestamp) {
        let expires_at = now.saturating_add(self.ttl);
        if let Some(entry) = store.get_mut(key) {
            entry.expires_at = Some(expires_at);
        }
        self.index.schedule(key, expires_at);
    }
}

// == Absolute TTL ==
/// Entries expire `ttl` after they were stored; reads never extend that.
#[derive(Debug)]
pub struct AbsoluteTtlPolicy<K> {
    schedule: TtlSchedule<K>,
}

impl<K: Clone + Hash + Eq> AbsoluteTtlPolicy<K> {
    /// Creates the policy. TTLs between 1 and 24 ms are rejected; zero is
    /// accepted and expires every entry on insertion.
    pub fn new(ttl: Duration) -> Result<Self> {
        Ok(Self {
            schedule: TtlSchedule::new(ttl)?,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.schedule.ttl
    }
}

impl<K, V> EvictionPolicy<K, V> for AbsoluteTtlPolicy<K>
where
    K: Clone + Hash + Eq + Send,
{
    fn on_insert(&mut self, store: &mut EntryStore<K, V>, key: &K, now: Timestamp) -> Vec<K> {
        self.schedule.stamp(store, key, now);
        Vec::new()
    }

    fn on_access(&mut self, _store: &mut EntryStore<K, V>, _key: &K, _now: Timestamp) -> bool {
        false
    }

    fn on_remove(&mut self, key: &K) {
        self.schedule.index.cancel(key);
    }

    fn on_clear(&mut self) {
        self.schedule.index.clear();
    }

    fn is_expired(&self, entry: &Entry<V>, now: Timestamp) -> bool {
        entry.is_expired_at(now)
    }

    fn sweep_candidates(&self, _store: &EntryStore<K, V>, now: Timestamp) -> Vec<K> {
        self.schedule.index.due(now)
    }

    fn tracks_time(&self) -> bool {
        true
    }
}

// == Sliding TTL ==
/// Entries expire `ttl` after they were stored or last read with `get`.
///
/// Presence checks do not count as reads.
#[derive(Debug)]
pub struct SlidingTtlPolicy<K> {
    schedule: TtlSchedule<K>,
}

impl<K: Clone + Hash + Eq> SlidingTtlPolicy<K> {
    /// Creates the policy, with the same TTL rules as [`AbsoluteTtlPolicy`].
    pub fn new(ttl: Duration) -> Result<Self> {
        Ok(Self {
            schedule: TtlSchedule::new(ttl)?,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.schedule.ttl
    }
}

impl<K, V> EvictionPolicy<K, V> for SlidingTtlPolicy<K>
where
    K: Clone + Hash + Eq + Send,
{
    fn on_insert(&mut self, store: &mut EntryStore<K, V>, key: &K, now: Timestamp) -> Vec<K> {
        self.schedule.stamp(store, key, now);
        Vec::new()
    }

    fn on_access(&mut self, store: &mut EntryStore<K, V>, key: &K, now: Timestamp) -> bool {
        self.schedule.stamp(store, key, now);
        true
    }

    fn on_remove(&mut self, key: &K) {
        self.schedule.index.cancel(key);
    }

    fn on_clear(&mut self) {
        self.schedule.index.clear();
    }

    fn is_expired(&self, entry: &Entry<V>, now: Timestamp) -> bool {
        entry.is_expired_at(now)
    }

    fn sweep_candidates(&self, _store: &EntryStore<K, V>, now: Timestamp) -> Vec<K> {
        self.schedule.index.due(now)
    }

    fn tracks_time(&self) -> bool {
        true
    }
}
