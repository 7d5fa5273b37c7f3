//! Async Sweep Task
//!
//! Drives [`Cache::sweep`] from a tokio runtime instead of a dedicated
//! thread. Useful for caches built with [`CacheOptions::without_reaper`]
//! inside an async service.
//!
//! [`CacheOptions::without_reaper`]: crate::cache::CacheOptions::without_reaper

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;
use crate::policy::EvictionPolicy;

/// Spawns a task that sweeps `cache` every `period`.
///
/// The task runs until aborted through the returned handle.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(ExpireCache::with_options(policy, options.without_reaper())?);
/// let sweep_handle = spawn_sweep_task(cache.clone(), Duration::from_millis(100));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task<K, V, P>(cache: Arc<Cache<K, V, P>>, period: Duration) -> JoinHandle<()>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: EvictionPolicy<K, V> + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting sweep task with period of {} ms",
            period.as_millis()
        );

        loop {
            tokio::time::sleep(period).await;

            let removed = cache.sweep();
            if removed > 0 {
                info!("Sweep task: removed {} expired entries", removed);
            } else {
                debug!("Sweep task: no expired entries found");
            }
        }
    })
}
