//! Cache Engine
//!
//! Wires a store to its supervisor. Build one engine at startup and hand its
//! store to every caller instead of sharing a global.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::Result;
use crate::tasks::{Supervisor, SupervisorSettings, FLUSH_PERIOD, SIZE_SIGNAL_CAPACITY};

/// A cache store plus the background loops enforcing its bounds.
#[derive(Debug)]
pub struct CacheEngine {
    store: Arc<CacheStore>,
    supervisor: Supervisor,
}

impl CacheEngine {
    // == Start ==
    /// Validates `config`, builds the store and starts the supervisor.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the daily flush time is malformed; no
    /// background loop is started in that case.
    pub fn start(config: &Config) -> Result<Self> {
        let flush_time = config.flush_time()?;

        let (signal_tx, signal_rx) = mpsc::channel(SIZE_SIGNAL_CAPACITY);
        let store = Arc::new(
            CacheStore::new()
                .with_size_signal(signal_tx)
                .with_expired_rank_pruning(config.prune_expired_ranks),
        );

        let settings = SupervisorSettings {
            max_size_bytes: config.max_size_bytes,
            sweep_interval: config.sweep_interval(),
            first_flush_delay: flush_time.delay_from_now(),
            flush_period: FLUSH_PERIOD,
        };
        let supervisor = Supervisor::spawn(store.clone(), signal_rx, settings);

        info!(
            max_size_bytes = config.max_size_bytes,
            flush_time = %flush_time.time(),
            "Cache engine started"
        );

        Ok(Self { store, supervisor })
    }

    /// Returns a shared handle to the store.
    pub fn store(&self) -> Arc<CacheStore> {
        Arc::clone(&self.store)
    }

    /// Returns true while all background loops are alive.
    pub fn is_running(&self) -> bool {
        self.supervisor.is_running()
    }

    /// Stops the background loops. The store stays usable through any
    /// outstanding handles, without size or time enforcement.
    pub async fn shutdown(self) {
        self.supervisor.shutdown().await;
    }
}
