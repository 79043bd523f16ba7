//! Cache Module
//!
//! Provides the in-memory entry store, its eviction ranker and key derivation.

mod entry;
pub mod key;
mod ranker;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, CacheValue, ValueType};
pub use key::{canonical_params, derive_key};
pub use ranker::{RankEntry, Ranker};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
pub const SIZE_KB: u64 = 1024;
pub const SIZE_MB: u64 = 1024 * SIZE_KB;
pub const SIZE_GB: u64 = 1024 * SIZE_MB;

/// Share of ranked keys the size guard evicts once the limit is exceeded,
/// as `(numerator, denominator)`.
pub const EVICTION_FRACTION: (usize, usize) = (1, 3);
