//! Integration Tests for the Cache Engine
//!
//! Exercises the public API end to end: eviction, expiry driven by a manual
//! clock, the background reaper on real time, observers and concurrent use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mini_cache::{
    AbsoluteTtlPolicy, AccessExpirationDecorator, AccessExpireCache, AccessExpireLruCache,
    AccessExpiring, Cache, CacheError, CacheOptions, CapacityPolicy, Clock, ExpirationDecorator,
    ExpireCache, ExpireLruCache, LruCache, ManualClock, PerItemTtlPolicy, PolicyPair, ReaperState,
    SlidingPerItemTtlPolicy, SlidingTtlPolicy, Timestamp, UniqueAccessExpireCache,
    UniqueExpireCache, UniqueExpireLruCache,
};

// == Helper Functions ==

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn manual_options() -> (ManualClock, CacheOptions) {
    let clock = ManualClock::new();
    let options = CacheOptions::new()
        .with_clock(clock.clone())
        .without_reaper();
    (clock, options)
}

/// Polls `done` until it holds or `timeout` passes.
fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(ms(10));
    }
    done()
}

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (count.clone(), count)
}

// == LRU Tests ==

#[test]
fn test_lru_evicts_least_recently_used() {
    let cache: LruCache<u32, u32> = LruCache::new(2).unwrap();
    cache.add(1, 2);
    cache.add(3, 4);
    assert_eq!(cache.get(&1).as_deref(), Some(&2));
    cache.add(5, 6);

    assert!(cache.has(&1));
    assert!(!cache.has(&3));
    assert!(cache.has(&5));
}

#[test]
fn test_lru_size_n() {
    let cache: LruCache<u32, u32> = LruCache::new(5).unwrap();
    for key in 0..5 {
        cache.add(key, key * 10);
    }
    assert_eq!(cache.size(), 5);

    // Touch 0 and 1 so 2 becomes the oldest
    cache.get(&0);
    cache.get(&1);
    cache.add(5, 50);
    cache.add(6, 60);

    assert!(cache.has(&0));
    assert!(cache.has(&1));
    assert!(!cache.has(&2));
    assert!(!cache.has(&3));
    assert!(cache.has(&4));
    assert_eq!(cache.size(), 5);

    let mut keys = cache.keys();
    keys.sort_unstable();
    assert_eq!(keys, vec![0, 1, 4, 5, 6]);
}

#[test]
fn test_duplicate_add_replaces() {
    let cache: LruCache<u32, u32> = LruCache::new(4).unwrap();
    cache.add(1, 2);
    cache.add(1, 3);

    assert_eq!(cache.size(), 1);
    assert_eq!(cache.get(&1).as_deref(), Some(&3));
}

#[test]
fn test_remove_absent_key_is_noop() {
    let cache: LruCache<u32, u32> = LruCache::new(4).unwrap();
    let (removed, r) = counter();
    cache.on_remove(move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    cache.add(1, 2);
    cache.add(3, 4);
    cache.remove(&666);
    assert_eq!(cache.size(), 2);
    assert_eq!(removed.load(Ordering::SeqCst), 0);

    cache.remove(&1);
    assert_eq!(cache.size(), 1);
    assert!(!cache.has(&1));
    assert!(cache.has(&3));
    assert_eq!(removed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_clear_removes_everything() {
    let cache: ExpireLruCache<u32, u32> = ExpireLruCache::new(8, ms(600_000)).unwrap();
    for key in 0..6 {
        cache.add(key, key);
    }
    cache.clear();

    for key in 0..6 {
        assert!(!cache.has(&key));
    }
    assert_eq!(cache.size(), 0);
    assert!(cache.is_empty());
}

// == Construction Tests ==

#[test]
fn test_construction_floor() {
    assert!(matches!(
        ExpireCache::<u32, u32>::new(ms(24)),
        Err(CacheError::InvalidConfiguration(_))
    ));
    assert!(ExpireCache::<u32, u32>::new(ms(25)).is_ok());
    assert!(AccessExpireCache::<u32, u32>::new(ms(24)).is_err());
    assert!(matches!(
        LruCache::<u32, u32>::new(0),
        Err(CacheError::InvalidConfiguration(_))
    ));
    assert!(LruCache::<u32, u32>::new(1).is_ok());
    assert!(ExpireLruCache::<u32, u32>::new(1024, ms(24)).is_err());
    assert!(AccessExpireLruCache::<u32, u32>::new(0, ms(600)).is_err());
    assert!(UniqueExpireLruCache::<u32, ExpirationDecorator<u32>>::new(0).is_err());
}

#[test]
fn test_default_constructors() {
    assert!(LruCache::<u32, u32>::new_default().is_ok());
    assert!(ExpireCache::<u32, u32>::new_default().is_ok());
    assert!(AccessExpireCache::<u32, u32>::new_default().is_ok());
    assert!(ExpireLruCache::<u32, u32>::new_default().is_ok());
    assert!(AccessExpireLruCache::<u32, u32>::new_default().is_ok());
    assert!(UniqueExpireCache::<u32, ExpirationDecorator<u32>>::new().is_ok());
    assert!(UniqueAccessExpireCache::<u32, AccessExpirationDecorator<u32>>::new().is_ok());
}

// == Manual Clock Expiry Tests ==

#[test]
fn test_absolute_ttl_ignores_reads() {
    let (clock, options) = manual_options();
    let cache: ExpireCache<u32, u32> =
        Cache::with_options(AbsoluteTtlPolicy::new(ms(500)).unwrap(), options).unwrap();

    cache.add(1, 2);
    for _ in 0..9 {
        clock.advance(ms(50));
        assert!(cache.has(&1));
        assert!(cache.get(&1).is_some());
    }

    clock.advance(ms(50));
    assert!(!cache.has(&1));
    assert!(cache.get(&1).is_none());
    assert_eq!(cache.size(), 0);
}

#[test]
fn test_sliding_ttl_extended_by_get_only() {
    let (clock, options) = manual_options();
    let cache: AccessExpireCache<u32, u32> =
        Cache::with_options(SlidingTtlPolicy::new(ms(500)).unwrap(), options).unwrap();

    cache.add(1, 2);
    for _ in 0..10 {
        clock.advance(ms(250));
        assert_eq!(cache.get(&1).as_deref(), Some(&2));
    }

    // Presence checks alone let it lapse
    clock.advance(ms(250));
    assert!(cache.has(&1));
    clock.advance(ms(250));
    assert!(!cache.has(&1));
}

#[test]
fn test_expire_lru_combines_both_bounds() {
    let (clock, options) = manual_options();
    let policy = PolicyPair::new(
        CapacityPolicy::new(3).unwrap(),
        AbsoluteTtlPolicy::new(ms(100)).unwrap(),
    );
    let cache: ExpireLruCache<u32, u32> = Cache::with_options(policy, options).unwrap();

    cache.add(1, 1);
    cache.add(2, 2);
    cache.add(3, 3);
    cache.add(4, 4);
    assert!(!cache.has(&1));
    assert_eq!(cache.size(), 3);

    clock.advance(ms(60));
    cache.add(5, 5);
    assert_eq!(cache.keys().len(), 3);

    clock.advance(ms(40));
    assert!(!cache.has(&3));
    assert!(!cache.has(&4));
    assert!(cache.has(&5));
    assert_eq!(cache.size(), 1);

    let stats = cache.stats();
    assert_eq!(stats.evictions, 2);
    assert!(stats.expirations >= 1);
}

#[test]
fn test_access_expire_lru_size_drains() {
    let (clock, options) = manual_options();
    let policy = PolicyPair::new(
        CapacityPolicy::new(1024).unwrap(),
        SlidingTtlPolicy::new(ms(100)).unwrap(),
    );
    let cache: AccessExpireLruCache<u32, u32> = Cache::with_options(policy, options).unwrap();

    cache.add(1, 2);
    cache.add(3, 4);
    clock.advance(ms(60));
    cache.get(&1);
    clock.advance(ms(60));

    assert_eq!(cache.size(), 1);
    clock.advance(ms(60));
    assert_eq!(cache.size(), 0);
}

#[test]
fn test_per_item_expiration() {
    let (clock, options) = manual_options();
    let cache: UniqueExpireCache<u32, ExpirationDecorator<u32>> =
        Cache::with_options(PerItemTtlPolicy::new(), options).unwrap();

    cache.add(1, ExpirationDecorator::with_clock(10, ms(100), &clock));
    cache.add(2, ExpirationDecorator::with_clock(20, ms(300), &clock));
    // Zero lifetime: expired on arrival
    cache.add(3, ExpirationDecorator::with_clock(30, Duration::ZERO, &clock));

    assert!(cache.has(&1));
    assert!(cache.has(&2));
    assert!(!cache.has(&3));

    clock.advance(ms(100));
    assert!(!cache.has(&1));
    assert_eq!(cache.get(&2).map(|v| *v.value()), Some(20));

    clock.advance(ms(200));
    assert!(cache.get(&2).is_none());
    assert_eq!(cache.size(), 0);
}

#[test]
fn test_per_item_sliding_expiration() {
    let (clock, options) = manual_options();
    let cache: UniqueAccessExpireCache<u32, AccessExpirationDecorator<u32>> =
        Cache::with_options(SlidingPerItemTtlPolicy::new(), options).unwrap();

    cache.add(1, AccessExpirationDecorator::with_clock(2, ms(100), &clock));
    for _ in 0..5 {
        clock.advance(ms(80));
        assert_eq!(cache.get(&1).map(|v| *v.value()), Some(2));
    }

    clock.advance(ms(80));
    assert!(cache.has(&1));
    clock.advance(ms(20));
    assert!(!cache.has(&1));
}

#[test]
fn test_shared_value_refreshed_through_other_key() {
    let (clock, options) = manual_options();
    let cache: UniqueAccessExpireCache<u32, AccessExpirationDecorator<u32>> =
        Cache::with_options(SlidingPerItemTtlPolicy::new(), options).unwrap();

    let shared = Arc::new(AccessExpirationDecorator::with_clock(7, ms(100), &clock));
    cache.add_shared(1, Arc::clone(&shared));
    cache.add_shared(2, shared);

    clock.advance(ms(80));
    assert!(cache.get(&1).is_some());

    // Both keys hold the value refreshed at 80 ms, alive until 180 ms
    clock.advance(ms(30));
    assert!(cache.has(&2));
    assert_eq!(cache.size(), 2);
    assert!(cache.has(&2));
    assert_eq!(cache.sweep(), 0);
    assert!(cache.has(&1));

    clock.advance(ms(70));
    assert_eq!(cache.size(), 0);
    assert!(!cache.has(&1));
    assert!(!cache.has(&2));
}

#[test]
fn test_handle_refresh_keeps_entry() {
    let (clock, options) = manual_options();
    let cache: UniqueAccessExpireCache<u32, AccessExpirationDecorator<u32>> =
        Cache::with_options(SlidingPerItemTtlPolicy::new(), options).unwrap();

    cache.add(1, AccessExpirationDecorator::with_clock(2, ms(100), &clock));
    let handle = cache.get(&1).unwrap();

    clock.advance(ms(90));
    handle.refresh(clock.now());

    clock.advance(ms(20));
    assert_eq!(cache.sweep(), 0);
    assert!(cache.has(&1));
    assert_eq!(cache.stats().expirations, 0);

    // Pulling the deadline in is seen by size() and has() alike
    handle.refresh(Timestamp::from_millis(0));
    assert_eq!(cache.size(), 0);
    assert!(!cache.has(&1));
    assert_eq!(cache.stats().expirations, 1);
}

#[test]
fn test_unique_expire_lru_capacity() {
    let (clock, options) = manual_options();
    let policy = PolicyPair::new(CapacityPolicy::new(2).unwrap(), PerItemTtlPolicy::new());
    let cache: UniqueExpireLruCache<u32, ExpirationDecorator<u32>> =
        Cache::with_options(policy, options).unwrap();

    cache.add(1, ExpirationDecorator::with_clock(1, ms(1000), &clock));
    cache.add(2, ExpirationDecorator::with_clock(2, ms(50), &clock));
    cache.add(3, ExpirationDecorator::with_clock(3, ms(1000), &clock));

    assert!(!cache.has(&1));
    assert!(cache.has(&2));

    clock.advance(ms(50));
    assert!(!cache.has(&2));
    assert!(cache.has(&3));
}

// == Event Tests ==

#[test]
fn test_add_update_remove_events() {
    let cache: LruCache<u32, u32> = LruCache::new(3).unwrap();
    let (adds, a) = counter();
    let (updates, u) = counter();
    let (removes, r) = counter();
    cache.on_add(move |_, _| {
        a.fetch_add(1, Ordering::SeqCst);
    });
    cache.on_update(move |_, _| {
        u.fetch_add(1, Ordering::SeqCst);
    });
    cache.on_remove(move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    cache.add(1, 2);
    assert_eq!(adds.load(Ordering::SeqCst), 1);

    cache.update(1, 3);
    assert_eq!(adds.load(Ordering::SeqCst), 1);
    assert_eq!(updates.load(Ordering::SeqCst), 1);

    // Re-adding an existing key reports the old entry leaving
    cache.add(1, 4);
    assert_eq!(adds.load(Ordering::SeqCst), 2);
    assert_eq!(removes.load(Ordering::SeqCst), 1);

    cache.update(2, 5);
    assert_eq!(adds.load(Ordering::SeqCst), 3);
    assert_eq!(updates.load(Ordering::SeqCst), 1);

    cache.remove(&1);
    assert_eq!(removes.load(Ordering::SeqCst), 2);
}

#[test]
fn test_add_event_sees_new_value() {
    let cache: LruCache<u32, String> = LruCache::new(3).unwrap();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let s = seen.clone();
    cache.on_add(move |key, value| s.lock().push(format!("{key}:{value}")));

    cache.add(1, "a".to_string());
    cache.add(1, "b".to_string());

    assert_eq!(*seen.lock(), vec!["1:a".to_string(), "1:b".to_string()]);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let cache: LruCache<u32, u32> = LruCache::new(3).unwrap();
    let (adds, a) = counter();
    let id = cache.on_add(move |_, _| {
        a.fetch_add(1, Ordering::SeqCst);
    });

    cache.add(1, 1);
    assert!(cache.unsubscribe(id));
    cache.add(2, 2);

    assert_eq!(adds.load(Ordering::SeqCst), 1);
    assert!(!cache.unsubscribe(id));
}

#[test]
fn test_panicking_observer_does_not_poison_cache() {
    let cache: LruCache<u32, u32> = LruCache::new(3).unwrap();
    cache.on_add(|_, _| panic!("observer failure"));

    cache.add(1, 1);
    cache.add(2, 2);

    assert_eq!(cache.size(), 2);
    assert_eq!(cache.get(&1).as_deref(), Some(&1));
}

// == Handle Tests ==

#[test]
fn test_handle_survives_every_kind_of_removal() {
    let (clock, options) = manual_options();
    let policy = PolicyPair::new(
        CapacityPolicy::new(1).unwrap(),
        AbsoluteTtlPolicy::new(ms(100)).unwrap(),
    );
    let cache: ExpireLruCache<u32, String> = Cache::with_options(policy, options).unwrap();

    cache.add(1, "evicted".to_string());
    let evicted = cache.get(&1).unwrap();
    cache.add(2, "expired".to_string());
    assert!(!cache.has(&1));

    let expired = cache.get(&2).unwrap();
    clock.advance(ms(100));
    assert_eq!(cache.sweep(), 1);

    cache.add(3, "removed".to_string());
    let removed = cache.get(&3).unwrap();
    cache.remove(&3);

    assert_eq!(*evicted, "evicted");
    assert_eq!(*expired, "expired");
    assert_eq!(*removed, "removed");
}

// == Reaper Tests ==

#[test]
fn test_reaper_drains_absolute_ttl() {
    let cache: ExpireCache<u32, u32> = ExpireCache::new(ms(500)).unwrap();
    let (removes, r) = counter();
    cache.on_remove(move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    cache.add(1, 2);
    assert!(cache.has(&1));

    // stats() does not reclaim anything itself, so this waits on the reaper
    assert!(wait_until(Duration::from_secs(5), || cache.stats().total_entries == 0));
    assert_eq!(removes.load(Ordering::SeqCst), 1);
    assert_eq!(cache.size(), 0);
    assert!(cache.get(&1).is_none());
}

#[test]
fn test_reaper_with_sliding_ttl() {
    let cache: AccessExpireCache<u32, u32> = AccessExpireCache::new(ms(500)).unwrap();
    cache.add(1, 2);

    for _ in 0..3 {
        thread::sleep(ms(125));
        assert_eq!(cache.get(&1).as_deref(), Some(&2));
    }

    thread::sleep(ms(600));
    assert!(!cache.has(&1));
}

#[test]
fn test_reaper_driven_by_manual_clock() {
    let clock = ManualClock::new();
    let options = CacheOptions::new()
        .with_clock(clock.clone())
        .with_sweep_period(ms(25));
    let cache: ExpireCache<u32, u32> =
        Cache::with_options(AbsoluteTtlPolicy::new(ms(100)).unwrap(), options).unwrap();

    cache.add(1, 1);
    cache.add(2, 2);
    thread::sleep(ms(100));
    assert_eq!(cache.stats().total_entries, 2);

    clock.advance(ms(100));
    assert!(wait_until(Duration::from_secs(5), || cache.stats().total_entries == 0));
    assert_eq!(cache.stats().expirations, 2);
}

#[test]
fn test_reaper_state() {
    let lru: LruCache<u32, u32> = LruCache::new(4).unwrap();
    assert_eq!(lru.reaper_state(), None);

    let (_clock, options) = manual_options();
    let no_reaper: ExpireCache<u32, u32> =
        Cache::with_options(AbsoluteTtlPolicy::new(ms(100)).unwrap(), options).unwrap();
    assert_eq!(no_reaper.reaper_state(), None);

    let ttl: ExpireCache<u32, u32> = ExpireCache::new(ms(100)).unwrap();
    let state = ttl.reaper_state().unwrap();
    assert!(matches!(
        state,
        ReaperState::Idle | ReaperState::Scheduled | ReaperState::Running
    ));
}

#[test]
fn test_drop_stops_reaper_promptly() {
    let options = CacheOptions::new().with_sweep_period(Duration::from_secs(3600));
    let cache: ExpireCache<u32, u32> =
        Cache::with_options(AbsoluteTtlPolicy::new(ms(100)).unwrap(), options).unwrap();
    cache.add(1, 1);

    let started = Instant::now();
    drop(cache);
    assert!(started.elapsed() < Duration::from_secs(5));
}

// == Concurrency Tests ==

#[test]
fn test_concurrent_access() {
    let cache: Arc<ExpireLruCache<u32, u64>> =
        Arc::new(ExpireLruCache::new(64, ms(60_000)).unwrap());
    let mut workers = Vec::new();

    for worker in 0..8u32 {
        let cache = Arc::clone(&cache);
        workers.push(thread::spawn(move || {
            for i in 0..500u32 {
                let key = (worker * 31 + i) % 128;
                match i % 4 {
                    0 | 1 => cache.add(key, u64::from(key) * 1000),
                    2 => {
                        if let Some(value) = cache.get(&key) {
                            assert_eq!(*value, u64::from(key) * 1000);
                        }
                    }
                    _ => {
                        cache.remove(&key);
                    }
                }
            }
        }));
    }

    for worker in workers {
        worker.join().unwrap();
    }

    assert!(cache.size() <= 64);
    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 8 * 125);
}

#[test]
fn test_concurrent_reads_during_reaping() {
    let cache: Arc<ExpireCache<u32, u32>> = Arc::new(ExpireCache::new(ms(50)).unwrap());
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let writer = {
        let cache = Arc::clone(&cache);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut key: u32 = 0;
            while !stop.load(Ordering::SeqCst) {
                cache.add(key % 32, key);
                key += 1;
            }
        })
    };

    let reader = {
        let cache = Arc::clone(&cache);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut handles = Vec::new();
            while !stop.load(Ordering::SeqCst) {
                for key in 0..32u32 {
                    if let Some(handle) = cache.get(&key) {
                        handles.push((key, handle));
                    }
                }
                handles.truncate(256);
            }
            handles
        })
    };

    thread::sleep(ms(300));
    stop.store(true, Ordering::SeqCst);
    writer.join().unwrap();
    let handles = reader.join().unwrap();

    // Values were written as `value % 32 == key`
    for (key, handle) in handles {
        assert_eq!(*handle % 32, key);
    }
    assert!(wait_until(Duration::from_secs(5), || cache.stats().total_entries == 0));
}
