//! Cache Entry Module
//!
//! Defines the stored payload shapes and the per-key entry metadata.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Value Type ==
/// Tag identifying the shape of a stored payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Text,
    Bytes,
}

impl ValueType {
    /// Returns the wire name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Text => "string",
            ValueType::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Value ==
/// A stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    /// UTF-8 text, also used for JSON documents
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl CacheValue {
    /// Returns the tag for this payload.
    pub fn value_type(&self) -> ValueType {
        match self {
            CacheValue::Text(_) => ValueType::Text,
            CacheValue::Bytes(_) => ValueType::Bytes,
        }
    }

    /// Byte length of the payload.
    pub fn size(&self) -> u64 {
        match self {
            CacheValue::Text(s) => s.len() as u64,
            CacheValue::Bytes(b) => b.len() as u64,
        }
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        CacheValue::Text(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        CacheValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(value: Vec<u8>) -> Self {
        CacheValue::Bytes(value)
    }
}

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
#[derive(Debug)]
pub struct CacheEntry {
    /// The stored payload
    pub value: CacheValue,
    /// Payload size in bytes, fixed at write time
    pub size: u64,
    /// Write timestamp (Unix milliseconds); reads do not update it
    pub last_used: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Number of successful reads since the entry was written
    access_count: AtomicU64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// # Arguments
    /// * `value` - The payload to store
    /// * `ttl` - Optional time to live, measured from now
    pub fn new(value: CacheValue, ttl: Option<Duration>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl.map(|ttl| now.saturating_add(ttl.as_millis() as u64));

        Self {
            size: value.size(),
            value,
            last_used: now,
            expires_at,
            access_count: AtomicU64::new(0),
        }
    }

    // == Value Type ==
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    // == Access Count ==
    /// Returns the number of reads recorded so far.
    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    /// Records one read and returns the new count.
    pub fn record_access(&self) -> u64 {
        self.access_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time. Entries without expiration never expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Same as [`is_expired`](Self::is_expired) against a fixed clock reading.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as zero.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
