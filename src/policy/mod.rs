//! Eviction Policy Module
//!
//! A policy decides which entries leave the cache and when. The cache calls
//! into its policy while holding its lock, so every hook here runs inside the
//! critical section and must stay short.
//!
//! # Policies
//! - [`CapacityPolicy`]: bounded item count, least recently used goes first
//! - [`AbsoluteTtlPolicy`]: cache-wide lifetime fixed at insertion
//! - [`SlidingTtlPolicy`]: cache-wide lifetime refreshed by `get`
//! - [`PerItemTtlPolicy`] / [`SlidingPerItemTtlPolicy`]: the value carries
//!   its own expiration
//! - [`PolicyPair`]: two policies applied together

mod capacity;
mod per_item;
mod ttl;

use std::collections::HashSet;
use std::hash::Hash;
use std::time::Duration;

use crate::cache::{Entry, EntryStore};
use crate::clock::Timestamp;
use crate::error::{CacheError, Result};

pub use capacity::CapacityPolicy;
pub use per_item::{
    AccessExpirationDecorator, AccessExpiring, ExpirationDecorator, Expiring, PerItemTtlPolicy,
    SlidingPerItemTtlPolicy,
};
pub use ttl::{AbsoluteTtlPolicy, SlidingTtlPolicy};

// == Public Constants ==
/// Shortest cache-wide TTL a policy accepts (zero excepted).
pub const MIN_TTL: Duration = Duration::from_millis(25);

/// Capacity used by the `new_default` constructors.
pub const DEFAULT_CAPACITY: usize = 1024;

/// TTL used by the `new_default` constructors (10 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_millis(600_000);

// == Eviction Policy ==
/// Hooks a cache calls on every mutation and lookup.
///
/// All hooks run under the owning cache's lock. Victims returned from
/// [`on_insert`](EvictionPolicy::on_insert) are removed by the cache, which
/// then calls [`on_remove`](EvictionPolicy::on_remove) for each of them, so
/// `on_remove` must tolerate keys the policy already forgot.
pub trait EvictionPolicy<K, V>: Send {
    /// Called after `key` was stored (new or replacing). Returns the keys
    /// that must be evicted to restore the policy's bound, least recently
    /// used first.
    fn on_insert(&mut self, store: &mut EntryStore<K, V>, key: &K, now: Timestamp) -> Vec<K>;

    /// Called by `get` on a live entry. Returns whether the access keeps the
    /// item alive.
    fn on_access(&mut self, store: &mut EntryStore<K, V>, key: &K, now: Timestamp) -> bool;

    /// Called after `key` left the store for any reason.
    fn on_remove(&mut self, key: &K);

    /// Called after the store was emptied.
    fn on_clear(&mut self);

    /// Pure expiry predicate shared by lookups and the reaper.
    fn is_expired(&self, entry: &Entry<V>, now: Timestamp) -> bool;

    /// Every currently expired key. Policies without a time dimension
    /// return nothing.
    fn sweep_candidates(&self, store: &EntryStore<K, V>, now: Timestamp) -> Vec<K>;

    /// Whether entries can expire with time, i.e. whether a reaper is
    /// worth running.
    fn tracks_time(&self) -> bool {
        false
    }
}

/// Validates a cache-wide TTL.
///
/// Zero is accepted and means entries are never alive. Anything between zero
/// and [`MIN_TTL`] is below what a sweep can resolve.
pub(crate) fn validate_ttl(ttl: Duration) -> Result<()> {
    if !ttl.is_zero() && ttl < MIN_TTL {
        return Err(CacheError::InvalidConfiguration(format!(
            "ttl must be at least {}ms, got {}ms",
            MIN_TTL.as_millis(),
            ttl.as_millis()
        )));
    }
    Ok(())
}

// == Policy Pair ==
/// Applies two policies to the same cache.
///
/// An entry is expired when either side says so, an access is refreshing when
/// either side refreshes, and victims or sweep candidates from both sides are
/// merged.
#[derive(Debug)]
pub struct PolicyPair<A, B> {
    first: A,
    second: B,
}

impl<A, B> PolicyPair<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

fn merge_unique<K: Clone + Hash + Eq>(mut left: Vec<K>, right: Vec<K>) -> Vec<K> {
    if right.is_empty() {
        return left;
    }
    let mut seen: HashSet<K> = left.iter().cloned().collect();
    for key in right {
        if seen.insert(key.clone()) {
            left.push(key);
        }
    }
    left
}

impl<K, V, A, B> EvictionPolicy<K, V> for PolicyPair<A, B>
where
    K: Clone + Hash + Eq,
    A: EvictionPolicy<K, V>,
    B: EvictionPolicy<K, V>,
{
    fn on_insert(&mut self, store: &mut EntryStore<K, V>, key: &K, now: Timestamp) -> Vec<K> {
        let first = self.first.on_insert(store, key, now);
        let second = self.second.on_insert(store, key, now);
        merge_unique(first, second)
    }

    fn on_access(&mut self, store: &mut EntryStore<K, V>, key: &K, now: Timestamp) -> bool {
        let first = self.first.on_access(store, key, now);
        let second = self.second.on_access(store, key, now);
        first || second
    }

    fn on_remove(&mut self, key: &K) {
        self.first.on_remove(key);
        self.second.on_remove(key);
    }

    fn on_clear(&mut self) {
        self.first.on_clear();
        self.second.on_clear();
    }

    fn is_expired(&self, entry: &Entry<V>, now: Timestamp) -> bool {
        self.first.is_expired(entry, now) || self.second.is_expired(entry, now)
    }

    fn sweep_candidates(&self, store: &EntryStore<K, V>, now: Timestamp) -> Vec<K> {
        merge_unique(
            self.first.sweep_candidates(store, now),
            self.second.sweep_candidates(store, now),
        )
    }

    fn tracks_time(&self) -> bool {
        self.first.tracks_time() || self.second.tracks_time()
    }
}
