//! Cache Key Module
//!
//! Derives date-bucketed cache keys from caller parameters.
//!
//! A key has the form `<sha256-hex>_<YYYYMMDD>`. Because the local calendar
//! day is part of the key, identical parameters resolve to a different slot
//! once the day rolls over.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

// == Derive Key ==
/// Derives the cache key for `params` on the current local day.
///
/// Returns an empty string for empty params, which callers treat as
/// "no cache slot available".
pub fn derive_key(params: &str) -> String {
    derive_key_on(params, Local::now().date_naive())
}

/// Derives the cache key for `params` on an explicit calendar day.
pub fn derive_key_on(params: &str, day: NaiveDate) -> String {
    if params.is_empty() {
        return String::new();
    }

    let digest = Sha256::digest(params.as_bytes());
    format!("{}_{}", hex::encode(digest), day.format("%Y%m%d"))
}

// == Canonical Params ==
/// Serializes arbitrary parameters into a stable string suitable for
/// [`derive_key`].
///
/// Values go through `serde_json::Value`, whose object maps are ordered by
/// key, so two maps with the same contents canonicalize identically.
/// Returns `None` for `null`, the empty string, or unserializable input.
pub fn canonical_params<P>(params: &P) -> Option<String>
where
    P: Serialize + ?Sized,
{
    let value = match serde_json::to_value(params) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "params are not serializable, skipping cache");
            return None;
        }
    };

    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        // Plain strings are used as-is so `"report"` and `report` share a slot
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_key_format() {
        let key = derive_key_on("hello", day(2024, 3, 9));

        let (digest, date) = key.split_once('_').unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(date, "20240309");
    }

    #[test]
    fn test_key_is_deterministic_within_a_day() {
        let today = day(2024, 3, 9);
        assert_eq!(derive_key_on("params", today), derive_key_on("params", today));
        assert_ne!(derive_key_on("params", today), derive_key_on("other", today));
    }

    #[test]
    fn test_key_changes_across_days() {
        let a = derive_key_on("params", day(2024, 3, 9));
        let b = derive_key_on("params", day(2024, 3, 10));

        assert_ne!(a, b);
        assert_eq!(a.split('_').next(), b.split('_').next());
    }

    #[test]
    fn test_empty_params_yield_empty_key() {
        assert!(derive_key("").is_empty());
        assert!(derive_key_on("", day(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_known_digest() {
        let key = derive_key_on("abc", day(2024, 1, 1));
        assert_eq!(
            key,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad_20240101"
        );
    }

    #[test]
    fn test_canonical_params_sorts_map_keys() {
        let mut first = HashMap::new();
        first.insert("b", 2);
        first.insert("a", 1);
        first.insert("c", 3);

        let mut second = HashMap::new();
        second.insert("c", 3);
        second.insert("a", 1);
        second.insert("b", 2);

        let canonical = canonical_params(&first).unwrap();
        assert_eq!(canonical, r#"{"a":1,"b":2,"c":3}"#);
        assert_eq!(Some(canonical), canonical_params(&second));
    }

    #[test]
    fn test_canonical_params_empty_values() {
        assert_eq!(canonical_params(&()), None);
        assert_eq!(canonical_params(""), None);
        assert_eq!(canonical_params(&Option::<u32>::None), None);
        assert_eq!(canonical_params("report").as_deref(), Some("report"));
        assert_eq!(canonical_params(&[1, 2]).as_deref(), Some("[1,2]"));
    }
}
