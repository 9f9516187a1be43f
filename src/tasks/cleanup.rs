//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries so they do
//! not wait for a read to be dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ResponseCache;

/// Spawns a task that calls `invalidate_expired` every `interval`.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(ResponseCache::new(1000, Duration::from_secs(300)));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<ResponseCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "starting cache expiry sweep"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.invalidate_expired().await;
            if removed > 0 {
                info!(removed, "expiry sweep removed cached responses");
            } else {
                debug!("expiry sweep found nothing to remove");
            }
        }
    })
}
