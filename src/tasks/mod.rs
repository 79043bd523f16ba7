//! Background Tasks Module
//!
//! The supervisor: three independent loops that enforce the cache's bounds.
//!
//! # Tasks
//! - Expiration sweep: removes expired entries at a fixed interval
//! - Size guard: evicts the lowest-priority third of keys when over the byte ceiling
//! - Scheduled flush: clears everything once a day at a configured local time

mod expiration;
mod flush;
mod size_guard;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::CacheStore;

pub use expiration::spawn_expiration_task;
pub use flush::{delay_until, spawn_flush_task, FLUSH_PERIOD};
pub use size_guard::{spawn_size_guard_task, SIZE_SIGNAL_CAPACITY};

/// Schedule for the supervisor loops.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub max_size_bytes: u64,
    pub sweep_interval: Duration,
    pub first_flush_delay: Duration,
    pub flush_period: Duration,
}

// == Supervisor ==
/// Handle over the three background loops sharing one cancellation token.
#[derive(Debug)]
pub struct Supervisor {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Spawns all three loops. Must be called inside a Tokio runtime.
    ///
    /// `signals` is the receiving half of the channel attached to `store`
    /// with [`CacheStore::with_size_signal`].
    pub fn spawn(
        store: Arc<CacheStore>,
        signals: mpsc::Receiver<()>,
        settings: SupervisorSettings,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handles = vec![
            spawn_expiration_task(store.clone(), settings.sweep_interval, cancel.clone()),
            spawn_size_guard_task(
                store.clone(),
                settings.max_size_bytes,
                signals,
                cancel.clone(),
            ),
            spawn_flush_task(
                store,
                settings.first_flush_delay,
                settings.flush_period,
                cancel.clone(),
            ),
        ];

        Self { cancel, handles }
    }

    /// Returns true while every loop is still alive.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.handles.iter().all(|h| !h.is_finished())
    }

    /// Returns a token that stops every loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels all loops and waits for them to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Supervisor task ended abnormally: {}", e);
            }
        }
        info!("Supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SupervisorSettings {
        SupervisorSettings {
            max_size_bytes: 100,
            sweep_interval: Duration::from_millis(100),
            first_flush_delay: Duration::from_secs(3600),
            flush_period: FLUSH_PERIOD,
        }
    }

    #[tokio::test]
    async fn test_supervisor_runs_until_shutdown() {
        let (tx, rx) = mpsc::channel(SIZE_SIGNAL_CAPACITY);
        let store = Arc::new(CacheStore::new().with_size_signal(tx));
        let supervisor = Supervisor::spawn(store, rx, settings());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(supervisor.is_running());

        let done = tokio::time::timeout(Duration::from_secs(1), supervisor.shutdown()).await;
        assert!(done.is_ok(), "Shutdown should complete promptly");
    }

    #[tokio::test]
    async fn test_external_cancel_stops_loops() {
        let (tx, rx) = mpsc::channel(SIZE_SIGNAL_CAPACITY);
        let store = Arc::new(CacheStore::new().with_size_signal(tx));
        let supervisor = Supervisor::spawn(store, rx, settings());

        supervisor.cancellation_token().cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!supervisor.is_running());
        supervisor.shutdown().await;
    }
}
