//! Expiration Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that periodically removes expired entries.
///
/// The task sleeps for `interval` between sweeps and stops once `cancel`
/// fires.
///
/// # Arguments
/// * `store` - Shared reference to the cache store
/// * `interval` - Time between sweeps
/// * `cancel` - Token stopping the loop
pub fn spawn_expiration_task(
    store: Arc<CacheStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting expiration sweep");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let removed = store.cleanup_expired();
            if removed > 0 {
                info!("Expiration sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiration sweep: no expired entries found");
            }
        }

        info!("Expiration sweep stopped");
    })
}
