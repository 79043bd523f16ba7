//! Scheduled Flush Task
//!
//! Background task that clears the whole cache once a day at a fixed local time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::CacheStore;
use crate::config::FlushTime;

/// Period between flushes after the first one.
pub const FLUSH_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

// == Delay Until ==
/// Returns how long to wait from `now` until the next occurrence of `at`.
///
/// If `at` has already passed today the flush is scheduled for tomorrow;
/// a flush time equal to `now` fires immediately.
pub fn delay_until(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today = now.date().and_time(at);
    let target = if today < now {
        today + chrono::Duration::days(1)
    } else {
        today
    };

    (target - now).to_std().unwrap_or(Duration::ZERO)
}

impl FlushTime {
    /// Delay from the current local time until the next flush.
    pub fn delay_from_now(&self) -> Duration {
        delay_until(Local::now().naive_local(), self.time())
    }
}

/// Spawns the scheduled flush.
///
/// Waits `first_delay`, clears the store, then clears it again every
/// `period` until `cancel` fires.
pub fn spawn_flush_task(
    store: Arc<CacheStore>,
    first_delay: Duration,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            first_flush_in_secs = first_delay.as_secs(),
            "Starting scheduled flush"
        );

        let mut delay = first_delay;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let entries = store.len();
            store.clear();
            info!(entries, "Scheduled flush cleared cache");
            delay = period;
        }

        info!("Scheduled flush stopped");
    })
}
