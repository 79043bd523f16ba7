//! Cache Store Module
//!
//! Main cache engine combining a concurrent map with the priority ranker,
//! the aggregate size counter and TTL expiration.
//!
//! # Locking
//! `entries` is a sharded concurrent map, so reads never touch the ranker
//! lock. Every mutation (put, delete, eviction, expiration, clear) takes the
//! ranker mutex first and then updates the map, the size counter and the
//! ranker together. That single mutex keeps the map and the ranker in step,
//! and it is the main contention point: ranker operations are linear in the
//! number of keys and run while it is held.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::key::derive_key;
use crate::cache::ranker::{RankEntry, Ranker};
use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheEntry, CacheStats, CacheValue, ValueType, EVICTION_FRACTION};
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Concurrent entry store with a priority index for eviction.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: DashMap<String, CacheEntry>,
    /// Eviction priority index, also the lock serializing all mutations
    ranker: Mutex<Ranker>,
    /// Running total of payload bytes
    size: AtomicU64,
    /// Activity counters
    stats: StatsRecorder,
    /// Size-check signal to the size guard, fed by every put
    size_signal: Option<mpsc::Sender<()>>,
    /// Whether the expiration sweep also drops the ranker row
    prune_expired_ranks: bool,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store with no size guard attached.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            ranker: Mutex::new(Ranker::new()),
            size: AtomicU64::new(0),
            stats: StatsRecorder::new(),
            size_signal: None,
            prune_expired_ranks: true,
        }
    }

    /// Attaches the channel the size guard listens on.
    pub fn with_size_signal(mut self, signal: mpsc::Sender<()>) -> Self {
        self.size_signal = Some(signal);
        self
    }

    /// Chooses whether expired keys are also removed from the ranker.
    ///
    /// With `false` the sweep leaves the row in place; such stale rows are
    /// skipped at eviction time and replaced when the key is written again.
    pub fn with_expired_rank_pruning(mut self, prune: bool) -> Self {
        self.prune_expired_ranks = prune;
        self
    }

    // == Put ==
    /// Stores a payload under the key derived from `params`.
    ///
    /// An existing entry at the same key is replaced and its access history
    /// is lost. The aggregate size grows by the new payload's size without
    /// subtracting the replaced one, so rewriting a live key inflates
    /// [`size_bytes`](Self::size_bytes) until the key is removed or the
    /// store is cleared.
    ///
    /// Empty params derive no key and the call does nothing.
    pub fn put(&self, params: &str, value: CacheValue, ttl: Option<Duration>) {
        let key = derive_key(params);
        if key.is_empty() {
            debug!("Empty params, nothing cached");
            return;
        }

        let entry = CacheEntry::new(value, ttl);
        let size = entry.size;
        {
            let mut ranker = self.ranker.lock();
            let row = RankEntry::snapshot(&key, &entry);
            self.entries.insert(key.clone(), entry);
            self.size.fetch_add(size, Ordering::SeqCst);
            ranker.insert(row);
        }

        debug!(key = %key, size, "set cache");
        self.signal_size_check();
    }

    /// Stores a string payload.
    pub fn set_string(&self, params: &str, value: impl Into<String>, ttl: Option<Duration>) {
        self.put(params, CacheValue::Text(value.into()), ttl);
    }

    /// Stores a byte payload.
    pub fn set_bytes(&self, params: &str, value: impl Into<Vec<u8>>, ttl: Option<Duration>) {
        self.put(params, CacheValue::Bytes(value.into()), ttl);
    }

    /// Serializes `data` to JSON and stores it as a string payload.
    ///
    /// Serialization errors are returned and nothing is stored.
    pub fn set_json<T>(&self, params: &str, data: &T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_string(data)?;
        self.put(params, CacheValue::Text(json), ttl);
        Ok(())
    }

    // == Get ==
    /// Retrieves the payload stored for `params`.
    ///
    /// A successful read bumps the entry's access count but does not
    /// reorder the ranker. Expired entries that the sweep has not removed
    /// yet are reported as [`CacheError::Expired`] and left in place.
    ///
    /// # Errors
    /// - `NotFound` if nothing is stored (or params are empty)
    /// - `Expired` if the entry's expiration has passed
    /// - `TypeMismatch` if the payload is not of the `expected` type
    pub fn get(&self, params: &str, expected: ValueType) -> Result<CacheValue> {
        let key = derive_key(params);
        let Some(entry) = self.entries.get(&key) else {
            self.stats.record_miss();
            return Err(CacheError::NotFound(params.to_string()));
        };

        if entry.is_expired() {
            self.stats.record_miss();
            return Err(CacheError::Expired(params.to_string()));
        }

        let found = entry.value_type();
        if found != expected {
            return Err(CacheError::TypeMismatch { expected, found });
        }

        entry.record_access();
        self.stats.record_hit();
        Ok(entry.value.clone())
    }

    /// Retrieves a string payload.
    pub fn get_string(&self, params: &str) -> Result<String> {
        match self.get(params, ValueType::Text)? {
            CacheValue::Text(s) => Ok(s),
            other => Err(CacheError::TypeMismatch {
                expected: ValueType::Text,
                found: other.value_type(),
            }),
        }
    }

    /// Retrieves a byte payload.
    pub fn get_bytes(&self, params: &str) -> Result<Vec<u8>> {
        match self.get(params, ValueType::Bytes)? {
            CacheValue::Bytes(b) => Ok(b),
            other => Err(CacheError::TypeMismatch {
                expected: ValueType::Bytes,
                found: other.value_type(),
            }),
        }
    }

    /// Retrieves a string payload and deserializes it from JSON.
    pub fn load_json<T>(&self, params: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let json = self.get_string(params)?;
        Ok(serde_json::from_str(&json)?)
    }

    // == Delete ==
    /// Removes the entry for `params`.
    ///
    /// Returns true if an entry was removed; absent keys are a no-op.
    pub fn delete(&self, params: &str) -> bool {
        let key = derive_key(params);
        if key.is_empty() {
            return false;
        }

        let mut ranker = self.ranker.lock();
        // A stale row may outlive its entry when expired ranks are retained
        ranker.remove(&key);
        match self.entries.remove(&key) {
            Some((_, entry)) => {
                self.release(entry.size);
                debug!(key = %key, "deleted cache key");
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Discards every entry, resets the aggregate size and empties the ranker.
    pub fn clear(&self) {
        let mut ranker = self.ranker.lock();
        self.entries.clear();
        self.size.store(0, Ordering::SeqCst);
        ranker.clear();
        self.stats.record_flush();
        info!("Cache cleared");
    }

    // == Evict ==
    /// Evicts the lowest-priority `floor(ranked * numerator / denominator)`
    /// keys and returns how many entries were removed.
    ///
    /// Rows whose entry is already gone are dropped without touching the
    /// aggregate size.
    pub fn evict_bottom_fraction(&self, numerator: usize, denominator: usize) -> usize {
        let mut ranker = self.ranker.lock();
        let victims = ranker.split_bottom(numerator, denominator);

        let mut evicted = 0;
        for row in victims {
            if let Some((_, entry)) = self.entries.remove(&row.key) {
                self.release(entry.size);
                evicted += 1;
            }
        }

        self.stats.record_evictions(evicted);
        evicted
    }

    // == Check Size ==
    /// Evicts the bottom third of ranked keys if the aggregate size is over
    /// `max_size_bytes`.
    ///
    /// The reclaim is coarse: one third of the keys go regardless of how far
    /// over the limit the cache is. Returns the number of evicted entries.
    pub fn check_size(&self, max_size_bytes: u64) -> usize {
        let size = self.size_bytes();
        if size <= max_size_bytes {
            return 0;
        }

        let (numerator, denominator) = EVICTION_FRACTION;
        let evicted = self.evict_bottom_fraction(numerator, denominator);
        info!(
            size_before = size,
            size_after = self.size_bytes(),
            max_size_bytes,
            evicted,
            "Size limit exceeded, evicted lowest-priority entries"
        );
        evicted
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|item| item.value().is_expired_at(now))
            .map(|item| item.key().clone())
            .collect();

        if expired_keys.is_empty() {
            return 0;
        }

        let mut ranker = self.ranker.lock();
        let mut removed = 0;
        for key in expired_keys {
            // The key may have been rewritten with a fresh entry since the scan
            if let Some((_, entry)) = self.entries.remove_if(&key, |_, e| e.is_expired_at(now)) {
                self.release(entry.size);
                if self.prune_expired_ranks {
                    ranker.remove(&key);
                }
                debug!(key = %key, "cache expired");
                removed += 1;
            }
        }

        self.stats.record_expirations(removed);
        removed
    }

    // == Size ==
    /// Returns the aggregate payload size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Contains ==
    /// Returns true if an entry (expired or not) is stored for `params`.
    pub fn contains(&self, params: &str) -> bool {
        let key = derive_key(params);
        !key.is_empty() && self.entries.contains_key(&key)
    }

    // == Ranked Keys ==
    /// Returns the ranked keys, highest priority first.
    pub fn ranked_keys(&self) -> Vec<String> {
        self.ranker.lock().keys()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len(), self.size_bytes())
    }

    fn release(&self, size: u64) {
        let _ = self
            .size
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_sub(size))
            });
    }

    fn signal_size_check(&self) {
        if let Some(signal) = &self.size_signal {
            // A full queue already holds a pending check
            let _ = signal.try_send(());
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread::sleep;

    fn assert_bijection(store: &CacheStore) {
        let ranked: HashSet<String> = store.ranked_keys().into_iter().collect();
        let stored: HashSet<String> = store.entries.iter().map(|e| e.key().clone()).collect();
        assert_eq!(ranked, stored, "ranker and entries diverged");
        assert_eq!(store.ranked_keys().len(), store.len());
    }

    #[test]
    fn test_store_new() {
        let store = CacheStore::new();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.size_bytes(), 0);
    }

    #[test]
    fn test_store_set_and_get() {
        let store = CacheStore::new();

        store.set_string("key1", "value1", None);
        let value = store.get_string("key1").unwrap();

        assert_eq!(value, "value1");
        assert_eq!(store.len(), 1);
        assert_eq!(store.size_bytes(), 6);
        assert_bijection(&store);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store = CacheStore::new();

        let result = store.get_string("nonexistent");
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_store_empty_params_are_a_noop() {
        let store = CacheStore::new();

        store.set_string("", "value", None);

        assert!(store.is_empty());
        assert_eq!(store.size_bytes(), 0);
        assert!(store.get_string("").unwrap_err().is_miss());
        assert!(!store.delete(""));
    }

    #[test]
    fn test_store_size_accounting() {
        let store = CacheStore::new();

        for i in 0..10 {
            store.set_string(&format!("key{i}"), "123456", None);
        }

        assert_eq!(store.size_bytes(), 60);
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_store_overwrite_inflates_size() {
        let store = CacheStore::new();

        store.set_string("key1", "value1", None);
        store.set_string("key1", "value2", None);

        assert_eq!(store.get_string("key1").unwrap(), "value2");
        assert_eq!(store.len(), 1);
        assert_eq!(store.size_bytes(), 12);
        assert_bijection(&store);

        assert!(store.delete("key1"));
        assert_eq!(store.size_bytes(), 6);
    }

    #[test]
    fn test_store_overwrite_resets_access_count() {
        let store = CacheStore::new();

        store.set_string("key1", "value1", None);
        store.get_string("key1").unwrap();
        store.get_string("key1").unwrap();
        store.set_string("key1", "value2", None);

        let entry = store.entries.get(&derive_key("key1")).unwrap();
        assert_eq!(entry.access_count(), 0);
    }

    #[test]
    fn test_store_delete() {
        let store = CacheStore::new();

        store.set_string("x", "value", None);
        store.set_string("y", "other", None);
        assert!(store.delete("x"));

        assert!(matches!(store.get_string("x"), Err(CacheError::NotFound(_))));
        assert_eq!(store.size_bytes(), 5);
        assert_bijection(&store);
    }

    #[test]
    fn test_store_delete_nonexistent() {
        let store = CacheStore::new();
        store.set_string("x", "value", None);

        assert!(!store.delete("nonexistent"));
        assert_eq!(store.size_bytes(), 5);
    }

    #[test]
    fn test_store_type_mismatch_leaves_entry() {
        let store = CacheStore::new();
        store.set_bytes("blob", vec![1u8, 2, 3], None);

        let result = store.get_string("blob");
        assert!(matches!(
            result,
            Err(CacheError::TypeMismatch {
                expected: ValueType::Text,
                found: ValueType::Bytes
            })
        ));

        let entry = store.entries.get(&derive_key("blob")).unwrap();
        assert_eq!(entry.access_count(), 0);
        drop(entry);

        assert_eq!(store.get_bytes("blob").unwrap(), vec![1u8, 2, 3]);
    }

    #[test]
    fn test_store_get_bumps_access_count_without_reordering() {
        let store = CacheStore::new();

        store.set_string("a", "1", None);
        store.set_string("b", "2", None);
        let before = store.ranked_keys();

        for _ in 0..5 {
            store.get_string("a").unwrap();
        }

        let entry = store.entries.get(&derive_key("a")).unwrap();
        assert_eq!(entry.access_count(), 5);
        drop(entry);
        assert_eq!(store.ranked_keys(), before);
    }

    #[test]
    fn test_store_json_roundtrip() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Report {
            id: u32,
            tags: Vec<String>,
        }

        let store = CacheStore::new();
        let report = Report {
            id: 7,
            tags: vec!["daily".to_string()],
        };

        store.set_json("report", &report, None).unwrap();
        let loaded: Report = store.load_json("report").unwrap();

        assert_eq!(loaded, report);
    }

    #[test]
    fn test_store_json_decode_failure() {
        let store = CacheStore::new();
        store.set_string("report", "not json", None);

        let result: Result<Vec<u32>> = store.load_json("report");
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[test]
    fn test_store_expired_entry_reads_as_miss() {
        let store = CacheStore::new();

        store.set_string("kkk", "vvv", Some(Duration::from_millis(200)));
        assert_eq!(store.get_string("kkk").unwrap(), "vvv");

        sleep(Duration::from_millis(300));

        assert!(matches!(store.get_string("kkk"), Err(CacheError::Expired(_))));
        assert!(store.contains("kkk"), "reads do not remove expired entries");
    }

    #[test]
    fn test_store_cleanup_expired() {
        let store = CacheStore::new();

        store.set_string("key1", "value1", Some(Duration::from_millis(200)));
        store.set_string("key2", "value2", Some(Duration::from_secs(10)));
        store.set_string("key3", "value3", None);

        sleep(Duration::from_millis(300));

        let removed = store.cleanup_expired();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.size_bytes(), 12);
        assert!(store.get_string("key2").is_ok());
        assert_bijection(&store);
    }

    #[test]
    fn test_store_cleanup_can_retain_stale_ranks() {
        let store = CacheStore::new().with_expired_rank_pruning(false);

        store.set_string("key1", "value1", Some(Duration::from_millis(100)));
        store.set_string("key2", "value2", None);

        sleep(Duration::from_millis(200));
        assert_eq!(store.cleanup_expired(), 1);

        assert_eq!(store.len(), 1);
        assert_eq!(store.ranked_keys().len(), 2);
        assert_eq!(store.size_bytes(), 6);

        // Rewriting the key replaces the stale row instead of duplicating it
        store.set_string("key1", "value1", None);
        assert_eq!(store.ranked_keys().len(), 2);
        assert_bijection(&store);
    }

    #[test]
    fn test_store_eviction_skips_stale_rows() {
        let store = CacheStore::new().with_expired_rank_pruning(false);

        store.set_string("stale", "123456", Some(Duration::from_millis(50)));
        store.set_string("b", "123456", None);
        store.set_string("c", "123456", None);

        sleep(Duration::from_millis(100));
        store.cleanup_expired();

        // Bottom third of three rows is the stale one, nothing left to free
        assert_eq!(store.evict_bottom_fraction(1, 3), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.size_bytes(), 12);
        assert_bijection(&store);
    }

    #[test]
    fn test_store_check_size_evicts_bottom_third() {
        let store = CacheStore::new();

        for i in 0..10 {
            store.set_string(&format!("key{i}"), format!("val{i:03}"), None);
        }
        assert_eq!(store.check_size(100), 0);
        assert_eq!(store.len(), 10);

        for i in 10..20 {
            store.set_string(&format!("key{i}"), format!("val{i:03}"), None);
        }
        assert_eq!(store.size_bytes(), 120);

        let evicted = store.check_size(100);

        assert_eq!(evicted, 6);
        assert_eq!(store.len(), 14);
        assert_eq!(store.size_bytes(), 84);
        for i in 0..6 {
            assert!(store.get_string(&format!("key{i}")).is_err());
        }
        for i in 6..20 {
            assert_eq!(store.get_string(&format!("key{i}")).unwrap(), format!("val{i:03}"));
        }
        assert_eq!(store.stats().evictions, 6);
        assert_bijection(&store);
    }

    #[test]
    fn test_store_clear() {
        let store = CacheStore::new();

        store.set_string("a", "1", None);
        store.set_bytes("b", vec![0u8; 4], None);
        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.size_bytes(), 0);
        assert!(store.ranked_keys().is_empty());
        assert!(store.get_string("a").unwrap_err().is_miss());
        assert_eq!(store.stats().flushes, 1);
    }

    #[test]
    fn test_store_put_emits_size_signal() {
        let (tx, mut rx) = mpsc::channel(1);
        let store = CacheStore::new().with_size_signal(tx);

        store.set_string("a", "1", None);
        store.set_string("b", "2", None);
        store.set_string("c", "3", None);

        // Signals coalesce into the single queue slot
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_store_stats() {
        let store = CacheStore::new();

        store.set_string("key1", "value1", None);
        store.get_string("key1").unwrap();
        let _ = store.get_string("nonexistent");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.size_bytes, 6);
    }

    #[test]
    fn test_store_concurrent_writers() {
        let store = Arc::new(CacheStore::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.set_string(&format!("t{t}-k{i}"), "1234", None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 400);
        assert_eq!(store.size_bytes(), 1600);
        for t in 0..8 {
            for i in 0..50 {
                assert_eq!(store.get_string(&format!("t{t}-k{i}")).unwrap(), "1234");
            }
        }
        assert_bijection(&store);
    }
}
