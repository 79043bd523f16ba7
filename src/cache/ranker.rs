//! Ranker Module
//!
//! Priority index over live keys, used to pick eviction victims.

use crate::cache::CacheEntry;

// == Rank Entry ==
/// Snapshot of an entry's priority taken when the key was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankEntry {
    pub key: String,
    pub access_count: u64,
    pub last_used: u64,
}

impl RankEntry {
    /// Captures the current counters of `entry` stored under `key`.
    pub fn snapshot(key: &str, entry: &CacheEntry) -> Self {
        Self {
            key: key.to_string(),
            access_count: entry.access_count(),
            last_used: entry.last_used,
        }
    }

    /// True when a new row `self` belongs in front of `other`.
    ///
    /// Ties on both counters go to the newer row, so the latest write ranks
    /// ahead of everything written before it.
    fn outranks(&self, other: &RankEntry) -> bool {
        other.access_count < self.access_count
            || (other.access_count == self.access_count && other.last_used <= self.last_used)
    }
}

// == Ranker ==
/// Ordered sequence of rank rows, highest priority first.
///
/// Rows are ordered by descending access count, then by descending write
/// time. Reads between writes are not reflected: the order is the snapshot
/// taken at the last write of each key.
///
/// Insertion and removal are linear scans. The store calls every method
/// under one mutex, so hold time grows with the number of keys.
#[derive(Debug, Default)]
pub struct Ranker {
    rows: Vec<RankEntry>,
}

impl Ranker {
    // == Constructor ==
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    // == Insert ==
    /// Inserts a row at its priority position.
    ///
    /// Any existing row for the same key is dropped first, so each key
    /// appears at most once.
    pub fn insert(&mut self, row: RankEntry) {
        self.remove(&row.key);

        match self.rows.iter().position(|existing| row.outranks(existing)) {
            Some(index) => self.rows.insert(index, row),
            None => self.rows.push(row),
        }
    }

    // == Remove ==
    /// Removes the row for `key`. Returns false if the key was not ranked.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.rows.iter().position(|row| row.key == key) {
            Some(index) => {
                self.rows.remove(index);
                true
            }
            None => false,
        }
    }

    // == Split Bottom ==
    /// Detaches the lowest-priority `floor(len * numerator / denominator)`
    /// rows and returns them, lowest priority last.
    pub fn split_bottom(&mut self, numerator: usize, denominator: usize) -> Vec<RankEntry> {
        if denominator == 0 {
            return Vec::new();
        }

        let count = (self.rows.len() * numerator / denominator).min(self.rows.len());
        let keep = self.rows.len() - count;
        self.rows.split_off(keep)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    // == Keys ==
    /// Returns ranked keys, highest priority first.
    pub fn keys(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.key.clone()).collect()
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    // == Contains ==
    pub fn contains(&self, key: &str) -> bool {
        self.rows.iter().any(|row| row.key == key)
    }
}
