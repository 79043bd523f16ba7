//! Configuration Module
//!
//! Handles loading and managing engine configuration from environment variables.

use std::env;
use std::time::Duration;

use chrono::{NaiveTime, Timelike};

use crate::cache::SIZE_MB;
use crate::error::{CacheError, Result};

/// Engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Aggregate byte ceiling enforced by the size guard
    pub max_size_bytes: u64,
    /// Local time of the daily full flush, `HH:MM:SS`
    pub daily_flush_time: String,
    /// Expiration sweep interval in seconds
    pub sweep_interval: u64,
    /// Whether the expiration sweep also drops the ranker row of expired keys
    pub prune_expired_ranks: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE_BYTES` - Byte ceiling (default: 128 MiB)
    /// - `CACHE_FLUSH_TIME` - Daily flush time (default: 07:00:00)
    /// - `CACHE_SWEEP_INTERVAL` - Expiration sweep frequency in seconds (default: 1)
    /// - `CACHE_PRUNE_EXPIRED_RANKS` - `true`/`false` (default: true)
    ///
    /// The flush time is validated later by [`FlushTime::parse`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_size_bytes: env::var("CACHE_MAX_SIZE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_size_bytes),
            daily_flush_time: env::var("CACHE_FLUSH_TIME").unwrap_or(defaults.daily_flush_time),
            sweep_interval: env::var("CACHE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.sweep_interval),
            prune_expired_ranks: env::var("CACHE_PRUNE_EXPIRED_RANKS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.prune_expired_ranks),
        }
    }

    /// Returns the sweep interval as a Duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    /// Parses the configured daily flush time.
    pub fn flush_time(&self) -> Result<FlushTime> {
        FlushTime::parse(&self.daily_flush_time)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size_bytes: 128 * SIZE_MB,
            daily_flush_time: "07:00:00".to_string(),
            sweep_interval: 1,
            prune_expired_ranks: true,
        }
    }
}

// == Flush Time ==
/// Local wall-clock time of day at which the cache is flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushTime(NaiveTime);

impl FlushTime {
    /// Parses an `HH:MM:SS` time of day.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` for anything that is not a valid time.
    pub fn parse(value: &str) -> Result<Self> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M:%S")
            .map(Self)
            .map_err(|e| CacheError::ConfigInvalid(format!("flush time {value:?}: {e}")))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn second(&self) -> u32 {
        self.0.second()
    }
}
