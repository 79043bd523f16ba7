//! Cache Anything - an in-process memoizing cache
//!
//! Stores computed results under date-bucketed keys, bounded by an aggregate
//! byte ceiling, per-entry TTLs and a daily full flush.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod memo;
pub mod tasks;

pub use cache::{CacheStore, CacheValue, ValueType};
pub use config::{Config, FlushTime};
pub use engine::CacheEngine;
pub use error::{CacheError, Result};
pub use memo::{cache_anything, cache_anything_async};
