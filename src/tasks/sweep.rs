//! Expiry Sweep Task
//!
//! Background task that periodically evicts expired cache entries, which is
//! where EXPIRED events come from.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Spawns a background task that periodically drives
/// [`Cache::evict_expired`].
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps, and stops on its own once the cache is closed.
///
/// # Arguments
/// * `cache` - shared handle to the cache to sweep
/// * `sweep_interval_secs` - interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
pub fn spawn_sweep_task<K, V>(cache: Arc<Cache<K, V>>, sweep_interval_secs: u64) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            cache = %cache.name(),
            "Starting expiry sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            // Sleep for the configured interval
            tokio::time::sleep(interval).await;

            if cache.is_closed() {
                debug!(cache = %cache.name(), "cache closed, stopping sweep task");
                break;
            }

            match cache.evict_expired() {
                Ok(0) => debug!(cache = %cache.name(), "expiry sweep: nothing to remove"),
                Ok(removed) => {
                    info!(cache = %cache.name(), "expiry sweep: removed {} expired entries", removed)
                }
                // Synchronous listeners can fail a sweep; the entries are
                // gone either way, so log and keep sweeping.
                Err(e) => warn!(cache = %cache.name(), error = %e, "expiry sweep failed"),
            }
        }
    })
}
