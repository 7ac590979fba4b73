//! Cache Statistics Module
//!
//! Tracks cache activity: hits, misses, lazy evictions, writes per tier
//! and downgraded backend failures.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of reads that returned a value
    pub hits: u64,
    /// Number of reads that returned nothing (absent, expired or invalid)
    pub misses: u64,
    /// Number of invalid entries removed on access
    pub evictions: u64,
    /// Number of writes that landed in the compact store
    pub compact_writes: u64,
    /// Number of writes that landed in the blob store
    pub blob_writes: u64,
    /// Number of storage failures caught and downgraded
    pub backend_errors: u64,
    /// Entries currently in the compact store
    pub compact_entries: usize,
    /// Entries currently in the blob store
    pub blob_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by all engine operations.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    compact_writes: AtomicU64,
    blob_writes: AtomicU64,
    backend_errors: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compact_write(&self) {
        self.compact_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blob_write(&self) {
        self.blob_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Copies the counters; entry counts are filled in by the caller.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            compact_writes: self.compact_writes.load(Ordering::Relaxed),
            blob_writes: self.blob_writes.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            compact_entries: 0,
            blob_entries: 0,
        }
    }
}
