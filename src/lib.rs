//! Mini Cache - A generic in-process cache engine
//!
//! Keyed storage bounded by pluggable policies: LRU capacity, cache-wide
//! absolute or sliding TTL, per-item expiration, or a pair of them. Values
//! are handed out as `Arc<V>`, mutations are observable, and time-aware
//! caches run a background reaper.
//!
//! ```ignore
//! use mini_cache::LruCache;
//!
//! let cache: LruCache<u32, String> = LruCache::new(2)?;
//! cache.add(1, "one".to_string());
//! assert_eq!(cache.get(&1).as_deref().map(String::as_str), Some("one"));
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod policy;
pub mod tasks;

pub use cache::{
    AccessExpireCache, AccessExpireLruCache, Cache, CacheOptions, CacheStats, ExpireCache,
    ExpireLruCache, LruCache, RemovalReason, SubscriptionId, UniqueAccessExpireCache,
    UniqueAccessExpireLruCache, UniqueExpireCache, UniqueExpireLruCache,
};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use policy::{
    AbsoluteTtlPolicy, AccessExpirationDecorator, AccessExpiring, CapacityPolicy,
    EvictionPolicy, ExpirationDecorator, Expiring, PerItemTtlPolicy, PolicyPair,
    SlidingPerItemTtlPolicy, SlidingTtlPolicy,
};
pub use tasks::{spawn_sweep_task, ReaperState};
