//! Cache Events Module
//!
//! Typed observer lists for add, update, remove and clear notifications.
//!
//! Events are collected while the cache lock is held and delivered after it
//! is released, on the thread that caused them. Handlers must not call back
//! into the same cache synchronously.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

type KeyValueHandler<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;
type KeyHandler<K> = Arc<dyn Fn(&K) + Send + Sync>;
type ClearHandler = Arc<dyn Fn() + Send + Sync>;

// == Subscription Id ==
/// Handle returned by a subscribe call, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// == Removal Reason ==
/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// `remove` was called
    Explicit,
    /// `add` overwrote an existing key
    Replaced,
    /// Capacity pressure
    Evicted,
    /// Lifetime ran out
    Expired,
}

// == Cache Event ==
/// A mutation observed under the cache lock, pending delivery.
#[derive(Debug)]
pub enum CacheEvent<K, V> {
    Added { key: K, value: Arc<V> },
    Updated { key: K, value: Arc<V> },
    Removed { key: K, reason: RemovalReason },
    Cleared,
}

// == Observers ==
/// Subscriber lists for one cache.
pub struct Observers<K, V> {
    next_id: AtomicU64,
    on_add: RwLock<Vec<(SubscriptionId, KeyValueHandler<K, V>)>>,
    on_update: RwLock<Vec<(SubscriptionId, KeyValueHandler<K, V>)>>,
    on_remove: RwLock<Vec<(SubscriptionId, KeyHandler<K>)>>,
    on_clear: RwLock<Vec<(SubscriptionId, ClearHandler)>>,
}

impl<K, V> Default for Observers<K, V> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            on_add: RwLock::new(Vec::new()),
            on_update: RwLock::new(Vec::new()),
            on_remove: RwLock::new(Vec::new()),
            on_clear: RwLock::new(Vec::new()),
        }
    }
}

impl<K, V> fmt::Debug for Observers<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("on_add", &self.on_add.read().len())
            .field("on_update", &self.on_update.read().len())
            .field("on_remove", &self.on_remove.read().len())
            .field("on_clear", &self.on_clear.read().len())
            .finish()
    }
}

impl<K, V> Observers<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // == Subscribe ==
    pub fn subscribe_add<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.on_add.write().push((id, Arc::new(handler)));
        id
    }

    pub fn subscribe_update<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.on_update.write().push((id, Arc::new(handler)));
        id
    }

    pub fn subscribe_remove<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.on_remove.write().push((id, Arc::new(handler)));
        id
    }

    pub fn subscribe_clear<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.on_clear.write().push((id, Arc::new(handler)));
        id
    }

    // == Unsubscribe ==
    /// Drops the handler registered under `id`. Returns whether one was
    /// found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        fn drop_id<H>(list: &RwLock<Vec<(SubscriptionId, H)>>, id: SubscriptionId) -> bool {
            let mut list = list.write();
            let before = list.len();
            list.retain(|(existing, _)| *existing != id);
            list.len() != before
        }

        drop_id(&self.on_add, id)
            || drop_id(&self.on_update, id)
            || drop_id(&self.on_remove, id)
            || drop_id(&self.on_clear, id)
    }

    // == Dispatch ==
    /// Delivers events in order. A panicking handler is logged and skipped;
    /// the remaining handlers and events still run.
    pub fn dispatch(&self, events: Vec<CacheEvent<K, V>>) {
        for event in events {
            match event {
                CacheEvent::Added { key, value } => {
                    let handlers = snapshot(&self.on_add);
                    for handler in handlers {
                        guarded("add", || handler(&key, &*value));
                    }
                }
                CacheEvent::Updated { key, value } => {
                    let handlers = snapshot(&self.on_update);
                    for handler in handlers {
                        guarded("update", || handler(&key, &*value));
                    }
                }
                CacheEvent::Removed { key, .. } => {
                    let handlers = snapshot(&self.on_remove);
                    for handler in handlers {
                        guarded("remove", || handler(&key));
                    }
                }
                CacheEvent::Cleared => {
                    let handlers = snapshot(&self.on_clear);
                    for handler in handlers {
                        guarded("clear", || handler());
                    }
                }
            }
        }
    }
}

/// Copies a handler list so no observer lock is held while handlers run.
fn snapshot<H: Clone>(list: &RwLock<Vec<(SubscriptionId, H)>>) -> Vec<H> {
    list.read().iter().map(|(_, handler)| handler.clone()).collect()
}

fn guarded(event: &'static str, call: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
        warn!(event, "cache event handler panicked; continuing");
    }
}
