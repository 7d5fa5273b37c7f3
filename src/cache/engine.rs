//! Cache Engine Module
//!
//! The public cache type: an [`EntryStore`] and one [`EvictionPolicy`]
//! behind a single mutex, an observer list, and an optional background
//! reaper.
//!
//! Every operation follows the same shape: lock, consult the store and the
//! policy, collect events, unlock, deliver events. Values are handed out as
//! `Arc<V>`, so a handle obtained from [`Cache::get`] stays valid after the
//! entry is evicted.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::events::{CacheEvent, Observers, RemovalReason, SubscriptionId};
use crate::cache::{CacheStats, EntryStore, DEFAULT_SWEEP_PERIOD};
use crate::clock::{Clock, SystemClock, Timestamp};
use crate::error::{CacheError, Result};
use crate::policy::{
    AbsoluteTtlPolicy, AccessExpiring, CapacityPolicy, EvictionPolicy, Expiring,
    PerItemTtlPolicy, PolicyPair, SlidingPerItemTtlPolicy, SlidingTtlPolicy, DEFAULT_CAPACITY,
    DEFAULT_TTL,
};
use crate::tasks::{Reaper, ReaperState};

// == Cache Options ==
/// Per-instance knobs that are not part of the eviction policy.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Time source for all expiration math
    pub clock: Arc<dyn Clock>,
    /// Reaper period; `None` disables the background reaper
    pub sweep_period: Option<Duration>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
            sweep_period: Some(DEFAULT_SWEEP_PERIOD),
        }
    }
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_sweep_period(mut self, period: Duration) -> Self {
        self.sweep_period = Some(period);
        self
    }

    /// Disables the background reaper. Expired entries are then only
    /// reclaimed lazily or through [`Cache::sweep`].
    pub fn without_reaper(mut self) -> Self {
        self.sweep_period = None;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.sweep_period.is_some_and(|period| period.is_zero()) {
            return Err(CacheError::InvalidConfiguration(
                "sweep period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whether an insert came from `add` or `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertKind {
    Add,
    Update,
}

// == Cache State ==
/// Everything guarded by the cache mutex.
struct State<K, V, P> {
    store: EntryStore<K, V>,
    policy: P,
    stats: CacheStats,
}

impl<K, V, P> State<K, V, P>
where
    K: Clone + Hash + Eq,
    P: EvictionPolicy<K, V>,
{
    fn insert(
        &mut self,
        key: K,
        value: Arc<V>,
        now: Timestamp,
        kind: InsertKind,
        events: &mut Vec<CacheEvent<K, V>>,
    ) {
        let replaced = self
            .store
            .insert(key.clone(), Arc::clone(&value), now)
            .is_some();
        if replaced {
            self.policy.on_remove(&key);
        }

        let victims = self.policy.on_insert(&mut self.store, &key, now);

        match (kind, replaced) {
            (InsertKind::Update, true) => events.push(CacheEvent::Updated {
                key: key.clone(),
                value,
            }),
            (InsertKind::Add, true) => {
                events.push(CacheEvent::Removed {
                    key: key.clone(),
                    reason: RemovalReason::Replaced,
                });
                events.push(CacheEvent::Added {
                    key: key.clone(),
                    value,
                });
            }
            (_, false) => events.push(CacheEvent::Added {
                key: key.clone(),
                value,
            }),
        }

        for victim in victims {
            if victim != key {
                self.remove_entry(&victim, RemovalReason::Evicted, events);
            }
        }
    }

    fn remove_entry(
        &mut self,
        key: &K,
        reason: RemovalReason,
        events: &mut Vec<CacheEvent<K, V>>,
    ) -> bool {
        if self.store.remove(key).is_none() {
            return false;
        }
        self.policy.on_remove(key);
        self.stats.record_removal(reason);
        events.push(CacheEvent::Removed {
            key: key.clone(),
            reason,
        });
        true
    }

    /// Checks presence, reclaiming the entry on the spot if it expired.
    fn is_live(&mut self, key: &K, now: Timestamp, events: &mut Vec<CacheEvent<K, V>>) -> bool {
        let expired = match self.store.get(key) {
            Some(entry) => self.policy.is_expired(entry, now),
            None => return false,
        };
        if expired {
            self.remove_entry(key, RemovalReason::Expired, events);
            return false;
        }
        true
    }

    /// Removes every candidate the policy still reports as expired. A
    /// candidate `is_live` would keep is left in place.
    fn purge_expired(&mut self, now: Timestamp, events: &mut Vec<CacheEvent<K, V>>) -> usize {
        let candidates = self.policy.sweep_candidates(&self.store, now);
        let mut removed = 0;
        for key in candidates {
            let expired = self
                .store
                .get(&key)
                .is_some_and(|entry| self.policy.is_expired(entry, now));
            if expired && self.remove_entry(&key, RemovalReason::Expired, events) {
                removed += 1;
            }
        }
        removed
    }
}

pub(crate) struct Shared<K, V, P> {
    state: Mutex<State<K, V, P>>,
    observers: Observers<K, V>,
    clock: Arc<dyn Clock>,
}

impl<K, V, P> Shared<K, V, P>
where
    K: Clone + Hash + Eq,
    P: EvictionPolicy<K, V>,
{
    /// Runs one reclamation pass: remove every expired entry under the
    /// lock, then notify observers outside it.
    pub(crate) fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut events = Vec::new();
        let removed = self.state.lock().purge_expired(now, &mut events);
        self.observers.dispatch(events);
        removed
    }
}

// == Cache ==
/// A thread-safe keyed cache bounded by the eviction policy `P`.
///
/// See the aliases ([`LruCache`], [`ExpireCache`], ...) for ready-made
/// policy combinations.
///
/// Observer handlers run on the thread that caused the event, after the
/// internal lock is released. They must not call back into the same cache
/// synchronously.
pub struct Cache<K, V, P> {
    shared: Arc<Shared<K, V, P>>,
    reaper: Option<Reaper>,
}

impl<K, V, P> fmt::Debug for Cache<K, V, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("observers", &self.shared.observers)
            .field("reaper", &self.reaper)
            .finish_non_exhaustive()
    }
}

impl<K, V, P> Cache<K, V, P>
where
    K: Clone + Hash + Eq + Send + 'static,
    V: Send + Sync + 'static,
    P: EvictionPolicy<K, V> + 'static,
{
    // == Constructor ==
    /// Creates a cache with default options (system clock, background
    /// reaper when the policy has a time dimension).
    pub fn with_policy(policy: P) -> Result<Self> {
        Self::with_options(policy, CacheOptions::default())
    }

    /// Creates a cache with explicit options.
    pub fn with_options(policy: P, options: CacheOptions) -> Result<Self> {
        options.validate()?;

        let tracks_time = policy.tracks_time();
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                store: EntryStore::new(),
                policy,
                stats: CacheStats::new(),
            }),
            observers: Observers::new(),
            clock: options.clock,
        });

        let reaper = match options.sweep_period {
            Some(period) if tracks_time => {
                let target = Arc::clone(&shared);
                Some(Reaper::spawn(period, move || target.sweep())?)
            }
            _ => None,
        };

        Ok(Self { shared, reaper })
    }

    // == Add ==
    /// Inserts or replaces `key`.
    ///
    /// A new key fires `add`; an existing key fires `remove` then `add`.
    /// Entries evicted to make room fire `remove` each.
    pub fn add(&self, key: K, value: V) {
        self.add_shared(key, Arc::new(value));
    }

    /// Like [`add`](Cache::add) for a value that is already shared.
    pub fn add_shared(&self, key: K, value: Arc<V>) {
        self.insert(key, value, InsertKind::Add);
    }

    // == Update ==
    /// Replaces the value of `key`, firing only `update`. A missing key is
    /// inserted and fires `add`.
    pub fn update(&self, key: K, value: V) {
        self.insert(key, Arc::new(value), InsertKind::Update);
    }

    fn insert(&self, key: K, value: Arc<V>, kind: InsertKind) {
        let now = self.shared.clock.now();
        let mut events = Vec::new();
        self.shared
            .state
            .lock()
            .insert(key, value, now, kind, &mut events);
        self.shared.observers.dispatch(events);
    }

    // == Get ==
    /// Returns a handle to the value if `key` is present and not expired.
    ///
    /// Counts as an access for the policy (LRU recency, sliding TTL).
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let now = self.shared.clock.now();
        let mut events = Vec::new();
        let handle = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            if state.is_live(key, now, &mut events) {
                let refreshed = state.policy.on_access(&mut state.store, key, now);
                let handle = state.store.get_mut(key).map(|entry| {
                    if refreshed {
                        entry.touch(now);
                    }
                    entry.handle()
                });
                state.stats.record_lookup(true);
                handle
            } else {
                state.stats.record_lookup(false);
                None
            }
        };
        self.shared.observers.dispatch(events);
        handle
    }

    // == Has ==
    /// Presence test. Never extends an entry's life.
    pub fn has(&self, key: &K) -> bool {
        let now = self.shared.clock.now();
        let mut events = Vec::new();
        let live = self.shared.state.lock().is_live(key, now, &mut events);
        self.shared.observers.dispatch(events);
        live
    }

    // == Remove ==
    /// Removes `key` if present. Returns whether anything was removed.
    pub fn remove(&self, key: &K) -> bool {
        let mut events = Vec::new();
        let removed = self
            .shared
            .state
            .lock()
            .remove_entry(key, RemovalReason::Explicit, &mut events);
        self.shared.observers.dispatch(events);
        removed
    }

    // == Clear ==
    /// Drops every entry. Fires a single `clear` notification and no
    /// per-entry events.
    pub fn clear(&self) {
        {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            state.store.clear();
            state.policy.on_clear();
        }
        self.shared.observers.dispatch(vec![CacheEvent::Cleared]);
    }

    // == Size ==
    /// Number of live entries. Expired entries are reclaimed first, so this
    /// always agrees with [`has`](Cache::has).
    pub fn size(&self) -> usize {
        let now = self.shared.clock.now();
        let mut events = Vec::new();
        let len = {
            let mut state = self.shared.state.lock();
            state.purge_expired(now, &mut events);
            state.store.len()
        };
        self.shared.observers.dispatch(events);
        len
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    // == Keys ==
    /// All live keys, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        let now = self.shared.clock.now();
        let mut events = Vec::new();
        let keys = {
            let mut state = self.shared.state.lock();
            state.purge_expired(now, &mut events);
            state.store.keys().cloned().collect()
        };
        self.shared.observers.dispatch(events);
        keys
    }

    // == Sweep ==
    /// Runs one reaper cycle on the calling thread. Returns the number of
    /// expired entries removed.
    pub fn sweep(&self) -> usize {
        let removed = self.shared.sweep();
        if removed > 0 {
            debug!(removed, "manual sweep removed expired entries");
        }
        removed
    }

    // == Stats ==
    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        state.stats.clone().with_total_entries(state.store.len())
    }

    /// Current state of the background reaper, or `None` if none runs.
    pub fn reaper_state(&self) -> Option<ReaperState> {
        self.reaper.as_ref().map(Reaper::state)
    }

    // == Observers ==
    /// Subscribes to insertions of new keys (and re-insertions via `add`).
    pub fn on_add<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe_add(handler)
    }

    /// Subscribes to value changes made through [`update`](Cache::update).
    pub fn on_update<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe_update(handler)
    }

    /// Subscribes to removals of any kind: explicit, replacement, eviction
    /// and expiry.
    pub fn on_remove<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe_remove(handler)
    }

    pub fn on_clear<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.observers.subscribe_clear(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.observers.unsubscribe(id)
    }
}

// == Policy Aliases ==
/// Capacity-bounded LRU cache.
pub type LruCache<K, V> = Cache<K, V, CapacityPolicy<K>>;
/// Cache-wide absolute TTL.
pub type ExpireCache<K, V> = Cache<K, V, AbsoluteTtlPolicy<K>>;
/// Cache-wide sliding TTL.
pub type AccessExpireCache<K, V> = Cache<K, V, SlidingTtlPolicy<K>>;
/// Values carry their own expiration.
pub type UniqueExpireCache<K, V> = Cache<K, V, PerItemTtlPolicy<K>>;
/// Values carry their own sliding expiration.
pub type UniqueAccessExpireCache<K, V> = Cache<K, V, SlidingPerItemTtlPolicy<K>>;
/// LRU capacity plus absolute TTL.
pub type ExpireLruCache<K, V> = Cache<K, V, PolicyPair<CapacityPolicy<K>, AbsoluteTtlPolicy<K>>>;
/// LRU capacity plus sliding TTL.
pub type AccessExpireLruCache<K, V> =
    Cache<K, V, PolicyPair<CapacityPolicy<K>, SlidingTtlPolicy<K>>>;
/// LRU capacity plus per-item expiration.
pub type UniqueExpireLruCache<K, V> =
    Cache<K, V, PolicyPair<CapacityPolicy<K>, PerItemTtlPolicy<K>>>;
/// LRU capacity plus per-item sliding expiration.
pub type UniqueAccessExpireLruCache<K, V> =
    Cache<K, V, PolicyPair<CapacityPolicy<K>, SlidingPerItemTtlPolicy<K>>>;

impl<K, V> Cache<K, V, CapacityPolicy<K>>
where
    K: Clone + Hash + Eq + Send + 'static,
    V: Send + Sync + 'static,
{
    /// Fails with `InvalidConfiguration` for a capacity of zero.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_policy(CapacityPolicy::new(capacity)?)
    }

    pub fn new_default() -> Result<Self> {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<K, V> Cache<K, V, AbsoluteTtlPolicy<K>>
where
    K: Clone + Hash + Eq + Send + 'static,
    V: Send + Sync + 'static,
{
    /// Fails with `InvalidConfiguration` for a TTL between 1 and 24 ms.
    pub fn new(ttl: Duration) -> Result<Self> {
        Self::with_policy(AbsoluteTtlPolicy::new(ttl)?)
    }

    pub fn new_default() -> Result<Self> {
        Self::new(DEFAULT_TTL)
    }
}

impl<K, V> Cache<K, V, SlidingTtlPolicy<K>>
where
    K: Clone + Hash + Eq + Send + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Result<Self> {
        Self::with_policy(SlidingTtlPolicy::new(ttl)?)
    }

    pub fn new_default() -> Result<Self> {
        Self::new(DEFAULT_TTL)
    }
}

impl<K, V> Cache<K, V, PerItemTtlPolicy<K>>
where
    K: Clone + Hash + Eq + Send + 'static,
    V: Expiring + Send + Sync + 'static,
{
    pub fn new() -> Result<Self> {
        Self::with_policy(PerItemTtlPolicy::new())
    }
}

impl<K, V> Cache<K, V, SlidingPerItemTtlPolicy<K>>
where
    K: Clone + Hash + Eq + Send + 'static,
    V: AccessExpiring + Send + Sync + 'static,
{
    pub fn new() -> Result<Self> {
        Self::with_policy(SlidingPerItemTtlPolicy::new())
    }
}

impl<K, V> Cache<K, V, PolicyPair<CapacityPolicy<K>, AbsoluteTtlPolicy<K>>>
where
    K: Clone + Hash + Eq + Send + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self> {
        Self::with_policy(PolicyPair::new(
            CapacityPolicy::new(capacity)?,
            AbsoluteTtlPolicy::new(ttl)?,
        ))
    }

    pub fn new_default() -> Result<Self> {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl<K, V> Cache<K, V, PolicyPair<CapacityPolicy<K>, SlidingTtlPolicy<K>>>
where
    K: Clone + Hash + Eq + Send + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self> {
        Self::with_policy(PolicyPair::new(
            CapacityPolicy::new(capacity)?,
            SlidingTtlPolicy::new(ttl)?,
        ))
    }

    pub fn new_default() -> Result<Self> {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl<K, V> Cache<K, V, PolicyPair<CapacityPolicy<K>, PerItemTtlPolicy<K>>>
where
    K: Clone + Hash + Eq + Send + 'static,
    V: Expiring + Send + Sync + 'static,
{
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_policy(PolicyPair::new(
            CapacityPolicy::new(capacity)?,
            PerItemTtlPolicy::new(),
        ))
    }

    pub fn new_default() -> Result<Self> {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<K, V> Cache<K, V, PolicyPair<CapacityPolicy<K>, SlidingPerItemTtlPolicy<K>>>
where
    K: Clone + Hash + Eq + Send + 'static,
    V: AccessExpiring + Send + Sync + 'static,
{
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_policy(PolicyPair::new(
            CapacityPolicy::new(capacity)?,
            SlidingPerItemTtlPolicy::new(),
        ))
    }

    pub fn new_default() -> Result<Self> {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<K, V, P> Drop for Cache<K, V, P> {
    fn drop(&mut self) {
        if let Some(mut reaper) = self.reaper.take() {
            reaper.stop();
            info!("cache dropped; reaper stopped");
        }
    }
}
