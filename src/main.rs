//! Mini Cache demo
//!
//! Builds an expire-LRU cache from environment configuration, runs a short
//! synthetic workload against it and prints a JSON stats report.

use std::hash::Hash;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_cache::{
    AbsoluteTtlPolicy, Cache, CacheConfig, CapacityPolicy, EvictionPolicy, PolicyPair,
    SlidingTtlPolicy,
};

/// Longest TTL the demo is willing to wait out before reporting.
const MAX_DRAIN_WAIT: Duration = Duration::from_secs(10);

/// Main entry point for the Mini Cache demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build an expire-LRU cache (absolute or sliding TTL)
/// 4. Run a synthetic workload
/// 5. Wait for the reaper to drain expired entries
/// 6. Print a JSON stats report
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini Cache demo");

    let config = CacheConfig::from_env();
    config.validate().context("invalid cache configuration")?;
    info!(
        "Configuration loaded: capacity={}, ttl={}ms, sliding={}, sweep_period={}ms",
        config.capacity, config.ttl_ms, config.sliding, config.sweep_period_ms
    );

    let capacity = CapacityPolicy::new(config.capacity)?;
    let report = if config.sliding {
        let policy = PolicyPair::new(capacity, SlidingTtlPolicy::new(config.ttl())?);
        let cache = Cache::with_options(policy, config.options())?;
        run(&cache, &config).await
    } else {
        let policy = PolicyPair::new(capacity, AbsoluteTtlPolicy::new(config.ttl())?);
        let cache = Cache::with_options(policy, config.options())?;
        run(&cache, &config).await
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!("Demo complete");
    Ok(())
}

/// Runs the workload against `cache` and builds the report.
async fn run<P>(cache: &Cache<u64, String, P>, config: &CacheConfig) -> serde_json::Value
where
    P: EvictionPolicy<u64, String> + 'static,
{
    subscribe_logging(cache);

    let started = Instant::now();
    let keys = config.capacity as u64 * 2;
    for key in 0..keys {
        cache.add(key, format!("value-{key}"));
        // Re-read a hot subset so LRU keeps it
        if key % 4 == 0 {
            let _ = cache.get(&(key / 2));
        }
    }
    for key in 0..keys {
        let _ = cache.get(&key);
    }
    info!(
        "Workload finished in {:?}: {} live entries",
        started.elapsed(),
        cache.size()
    );

    let ttl = config.ttl();
    if ttl <= MAX_DRAIN_WAIT {
        // A couple of sweep periods past the TTL
        let wait = ttl + config.sweep_period() * 2;
        info!("Waiting {:?} for the reaper to drain expired entries", wait);
        tokio::time::sleep(wait).await;
    } else {
        warn!(
            "TTL of {:?} exceeds {:?}; reporting without waiting for expiry",
            ttl, MAX_DRAIN_WAIT
        );
    }

    let stats = cache.stats();
    json!({
        "generated_at": Utc::now().to_rfc3339(),
        "config": config,
        "reaper": cache.reaper_state().map(|state| format!("{state:?}")),
        "hit_rate": stats.hit_rate(),
        "stats": stats,
    })
}

fn subscribe_logging<K, P>(cache: &Cache<K, String, P>)
where
    K: Clone + Hash + Eq + Send + std::fmt::Debug + 'static,
    P: EvictionPolicy<K, String> + 'static,
{
    cache.on_add(|key, value| debug!(?key, %value, "added"));
    cache.on_update(|key, value| debug!(?key, %value, "updated"));
    cache.on_remove(|key| debug!(?key, "removed"));
    cache.on_clear(|| info!("cache cleared"));
}
