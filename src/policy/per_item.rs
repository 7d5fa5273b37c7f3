//! Per-item Expiration Policies
//!
//! The value decides when it expires. Values either implement [`Expiring`]
//! themselves or are wrapped in one of the decorators below.

use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::cache::{Entry, EntryStore};
use crate::clock::{Clock, SystemClock, Timestamp};
use crate::policy::EvictionPolicy;

// == Expiring ==
/// A value that knows its own expiration time.
pub trait Expiring {
    fn expires_at(&self) -> Timestamp;
}

/// A value whose expiration can be pushed forward by reading it.
///
/// The cache only calls [`refresh`](AccessExpiring::refresh) from `get`, and
/// always with the cache's lock held.
pub trait AccessExpiring: Expiring {
    /// Moves the expiration to `now` plus the value's own span.
    fn refresh(&self, now: Timestamp);
}

// == Expiration Decorator ==
/// Attaches a fixed expiration time to any value.
#[derive(Debug, Clone)]
pub struct ExpirationDecorator<T> {
    value: T,
    expires_at: Timestamp,
}

impl<T> ExpirationDecorator<T> {
    /// Expires `lifetime` from now on the system clock. A zero lifetime
    /// yields a value that is already expired.
    pub fn new(value: T, lifetime: Duration) -> Self {
        Self::with_clock(value, lifetime, &SystemClock)
    }

    pub fn with_clock(value: T, lifetime: Duration, clock: &dyn Clock) -> Self {
        Self::expiring_at(value, clock.now().saturating_add(lifetime))
    }

    pub fn expiring_at(value: T, expires_at: Timestamp) -> Self {
        Self { value, expires_at }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> Expiring for ExpirationDecorator<T> {
    fn expires_at(&self) -> Timestamp {
        self.expires_at
    }
}

// == Access Expiration Decorator ==
/// Attaches a sliding expiration to any value: each refresh moves the
/// deadline to `now + span`.
#[derive(Debug)]
pub struct AccessExpirationDecorator<T> {
    value: T,
    span: Duration,
    expires_at: AtomicU64,
}

impl<T> AccessExpirationDecorator<T> {
    /// Starts with a deadline of `span` from now on the system clock.
    pub fn new(value: T, span: Duration) -> Self {
        Self::with_clock(value, span, &SystemClock)
    }

    pub fn with_clock(value: T, span: Duration, clock: &dyn Clock) -> Self {
        let expires_at = clock.now().saturating_add(span);
        Self {
            value,
            span,
            expires_at: AtomicU64::new(expires_at.as_millis()),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn span(&self) -> Duration {
        self.span
    }
}

impl<T> Expiring for AccessExpirationDecorator<T> {
    fn expires_at(&self) -> Timestamp {
        Timestamp::from_millis(self.expires_at.load(Ordering::Acquire))
    }
}

impl<T> AccessExpiring for AccessExpirationDecorator<T> {
    fn refresh(&self, now: Timestamp) {
        let next = now.saturating_add(self.span);
        self.expires_at.store(next.as_millis(), Ordering::Release);
    }
}

/// Mirrors the value's current deadline onto its entry.
fn record_value_deadline<K, V>(store: &mut EntryStore<K, V>, key: &K)
where
    K: Clone + Hash + Eq,
    V: Expiring,
{
    if let Some(entry) = store.get_mut(key) {
        entry.expires_at = Some(entry.value().expires_at());
    }
}

/// Keys whose value reports a deadline at or before `now`.
///
/// Deadlines are read from the values on every pass. A value shared
/// between keys, or refreshed through a handle, may have moved since it
/// was inserted.
fn due_by_value<K, V>(store: &EntryStore<K, V>, now: Timestamp) -> Vec<K>
where
    K: Clone + Hash + Eq,
    V: Expiring,
{
    store
        .iter()
        .filter(|(_, entry)| now >= entry.value().expires_at())
        .map(|(key, _)| key.clone())
        .collect()
}

// == Per-item TTL ==
/// Each value expires at its own [`Expiring::expires_at`]; reads never
/// extend it.
#[derive(Debug)]
pub struct PerItemTtlPolicy<K> {
    _keys: PhantomData<fn() -> K>,
}

impl<K: Clone + Hash + Eq> PerItemTtlPolicy<K> {
    pub fn new() -> Self {
        Self { _keys: PhantomData }
    }
}

impl<K: Clone + Hash + Eq> Default for PerItemTtlPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EvictionPolicy<K, V> for PerItemTtlPolicy<K>
where
    K: Clone + Hash + Eq + Send,
    V: Expiring,
{
    fn on_insert(&mut self, store: &mut EntryStore<K, V>, key: &K, _now: Timestamp) -> Vec<K> {
        record_value_deadline(store, key);
        Vec::new()
    }

    fn on_access(&mut self, _store: &mut EntryStore<K, V>, _key: &K, _now: Timestamp) -> bool {
        false
    }

    fn on_remove(&mut self, _key: &K) {}

    fn on_clear(&mut self) {}

    fn is_expired(&self, entry: &Entry<V>, now: Timestamp) -> bool {
        now >= entry.value().expires_at()
    }

    fn sweep_candidates(&self, store: &EntryStore<K, V>, now: Timestamp) -> Vec<K> {
        due_by_value(store, now)
    }

    fn tracks_time(&self) -> bool {
        true
    }
}

// == Sliding Per-item TTL ==
/// Like [`PerItemTtlPolicy`], but every `get` calls
/// [`AccessExpiring::refresh`] on the value.
#[derive(Debug)]
pub struct SlidingPerItemTtlPolicy<K> {
    _keys: PhantomData<fn() -> K>,
}

impl<K: Clone + Hash + Eq> SlidingPerItemTtlPolicy<K> {
    pub fn new() -> Self {
        Self { _keys: PhantomData }
    }
}

impl<K: Clone + Hash + Eq> Default for SlidingPerItemTtlPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EvictionPolicy<K, V> for SlidingPerItemTtlPolicy<K>
where
    K: Clone + Hash + Eq + Send,
    V: AccessExpiring,
{
    fn on_insert(&mut self, store: &mut EntryStore<K, V>, key: &K, _now: Timestamp) -> Vec<K> {
        record_value_deadline(store, key);
        Vec::new()
    }

    fn on_access(&mut self, store: &mut EntryStore<K, V>, key: &K, now: Timestamp) -> bool {
        if let Some(entry) = store.get(key) {
            entry.value().refresh(now);
        }
        record_value_deadline(store, key);
        true
    }

    fn on_remove(&mut self, _key: &K) {}

    fn on_clear(&mut self) {}

    fn is_expired(&self, entry: &Entry<V>, now: Timestamp) -> bool {
        now >= entry.value().expires_at()
    }

    fn sweep_candidates(&self, store: &EntryStore<K, V>, now: Timestamp) -> Vec<K> {
        due_by_value(store, now)
    }

    fn tracks_time(&self) -> bool {
        true
    }
}
