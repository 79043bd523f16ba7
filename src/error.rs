//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::cache::ValueType;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache (also returned for params that derive an empty key)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Key is still stored but its expiration has passed
    #[error("Key expired: {0}")]
    Expired(String),

    /// Stored payload has a different shape than the reader asked for
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValueType, found: ValueType },

    /// Payload could not be encoded or decoded
    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
}

impl CacheError {
    // == Is Miss ==
    /// Returns true when the error only means "nothing usable is cached".
    ///
    /// Callers treat a miss as a signal to fall through to the compute
    /// operation rather than as a failure.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::NotFound(_) | CacheError::Expired(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_classification() {
        assert!(CacheError::NotFound("k".to_string()).is_miss());
        assert!(CacheError::Expired("k".to_string()).is_miss());
        assert!(!CacheError::ConfigInvalid("bad".to_string()).is_miss());
        assert!(!CacheError::TypeMismatch {
            expected: ValueType::Text,
            found: ValueType::Bytes,
        }
        .is_miss());
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = CacheError::TypeMismatch {
            expected: ValueType::Text,
            found: ValueType::Bytes,
        };
        assert_eq!(err.to_string(), "Type mismatch: expected string, found bytes");
    }
}
