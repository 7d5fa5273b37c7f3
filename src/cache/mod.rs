//! Cache Module
//!
//! In-process keyed cache with pluggable eviction: capacity (LRU), cache-wide
//! TTL, per-item TTL, or a pair of them.

mod engine;
mod entry;
mod events;
mod expiry;
mod lru;
mod stats;
mod store;


use std::time::Duration;

// Re-export public types
pub use engine::{
    AccessExpireCache, AccessExpireLruCache, Cache, CacheOptions, ExpireCache, ExpireLruCache,
    LruCache, UniqueAccessExpireCache, UniqueAccessExpireLruCache, UniqueExpireCache,
    UniqueExpireLruCache,
};
pub use entry::Entry;
pub use events::{CacheEvent, Observers, RemovalReason, SubscriptionId};
pub use expiry::ExpiryIndex;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::EntryStore;

// == Public Constants ==
/// Default period of the background reaper.
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_millis(25);
