//! Size Guard Task
//!
//! Background task enforcing the aggregate byte ceiling.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Capacity of the size-check queue. Puts that find it full drop their
/// signal, since the pending check will read the current aggregate anyway.
pub const SIZE_SIGNAL_CAPACITY: usize = 1;

/// Spawns the size guard.
///
/// Each signal received on `signals` triggers one [`CacheStore::check_size`]
/// against `max_size_bytes`. The loop ends when `cancel` fires or every
/// sender is gone.
pub fn spawn_size_guard_task(
    store: Arc<CacheStore>,
    max_size_bytes: u64,
    mut signals: mpsc::Receiver<()>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(max_size_bytes, "Starting size guard");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                signal = signals.recv() => match signal {
                    Some(()) => {
                        let evicted = store.check_size(max_size_bytes);
                        if evicted == 0 {
                            debug!(size_bytes = store.size_bytes(), "Size check passed");
                        }
                    }
                    None => {
                        debug!("Size-check channel closed");
                        break;
                    }
                },
            }
        }

        info!("Size guard stopped");
    })
}
