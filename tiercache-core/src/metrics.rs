//! Operation counters and their caller-facing snapshot.
//!
//! Both backends expose exactly the same counter set, the remote backend
//! simply never moves the eviction or residency fields. Counters live for
//! the whole instance: zeroed at construction, bumped on every relevant
//! operation and reset only through an explicit [`Metrics::reset`] call,
//! never implicitly.

use std::fmt::Display;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lifetime counters for one cache instance.
///
/// All counters are relaxed atomics; exactness across racing threads is
/// not part of the contract, monotonicity is.
#[derive(Debug, Default)]
pub struct Metrics {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
    size_evictions: AtomicU64,
    memory_evictions: AtomicU64,
    ttl_expired: AtomicU64,
    errors: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl Metrics {
    /// Creates a zeroed counter set.
    pub fn new() -> Self {
        Metrics::default()
    }

    /// Records a read that found a live entry.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a read that found nothing usable.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful write.
    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` explicit removals.
    pub fn record_deletes(&self, count: u64) {
        self.deletes.fetch_add(count, Ordering::Relaxed);
    }

    /// Records an eviction forced by the entry-count ceiling.
    pub fn record_size_eviction(&self) {
        self.size_evictions.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an eviction forced by the memory-byte ceiling.
    pub fn record_memory_eviction(&self) {
        self.memory_evictions.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` entries reclaimed because their TTL had passed.
    pub fn record_ttl_expired(&self, count: u64) {
        self.ttl_expired.fetch_add(count, Ordering::Relaxed);
    }

    /// Records an absorbed operational error.
    ///
    /// The error never reaches the caller; this counter and the retained
    /// message are the only trace it leaves.
    pub fn record_error(&self, error: impl Display) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        let mut last = self.last_error.lock().expect("metrics mutex poisoned");
        *last = Some(error.to_string());
    }

    /// Number of absorbed errors so far.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Zeroes every counter and clears the retained error message.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.size_evictions.store(0, Ordering::Relaxed);
        self.memory_evictions.store(0, Ordering::Relaxed);
        self.ttl_expired.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        let mut last = self.last_error.lock().expect("metrics mutex poisoned");
        *last = None;
    }

    /// Takes a point-in-time snapshot.
    ///
    /// Residency figures are supplied by the backend: the in-process
    /// backend reads them from its map, the remote backend passes zeros
    /// because the remote service owns the entries.
    pub fn snapshot(&self, current_size: u64, current_memory_bytes: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size_evictions: self.size_evictions.load(Ordering::Relaxed),
            memory_evictions: self.memory_evictions.load(Ordering::Relaxed),
            ttl_expired: self.ttl_expired.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .expect("metrics mutex poisoned")
                .clone(),
            current_size,
            current_memory_bytes,
        }
    }
}

/// Point-in-time view of a cache instance's counters.
///
/// The field names are identical for both backends so callers observing
/// stats cannot tell which backend produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads that found a live entry.
    pub hits: u64,
    /// Reads that found nothing usable.
    pub misses: u64,
    /// Successful writes.
    pub sets: u64,
    /// Explicit removals, including pattern and namespace deletes.
    pub deletes: u64,
    /// Total forced removals (count plus memory pressure).
    pub evictions: u64,
    /// Evictions forced by the entry-count ceiling.
    pub size_evictions: u64,
    /// Evictions forced by the memory-byte ceiling.
    pub memory_evictions: u64,
    /// Entries reclaimed because their TTL had passed.
    pub ttl_expired: u64,
    /// Absorbed operational errors.
    pub errors: u64,
    /// Message of the most recent absorbed error, if any.
    pub last_error: Option<String>,
    /// Resident entry count (in-process backend only, otherwise 0).
    pub current_size: u64,
    /// Estimated resident bytes (in-process backend only, otherwise 0).
    pub current_memory_bytes: u64,
}

impl CacheStats {
    /// Hit ratio over all reads so far, or `None` before the first read.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        if total == 0 {
            None
        } else {
            Some(self.hits as f64 / total as f64)
        }
    }
}
