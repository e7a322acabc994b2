// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Cache metrics: monotonic counters plus point-in-time gauges.
//!
//! Never on the hot path beyond increment-and-return; readers may observe
//! slightly stale values since there is no global fence on read.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Monotonic counters and gauges for a [`crate::TieredCache`].
#[derive(Debug, Default)]
pub struct Metrics {
    mem_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    mem_evictions: AtomicU64,
    disk_evictions: AtomicU64,
    fetches: AtomicU64,
    fetch_errors: AtomicU64,
    disk_errors: AtomicU64,
    index_errors: AtomicU64,
    bytes_read_from_mem: AtomicU64,
    bytes_read_from_disk: AtomicU64,
    bytes_fetched: AtomicU64,
    mem_bytes_used: AtomicU64,
    disk_bytes_used: AtomicU64,
}

/// A point-in-time copy of all counters and gauges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Reads served from the memory tier.
    pub mem_hits: u64,
    /// Reads served from the disk tier.
    pub disk_hits: u64,
    /// Reads that required a fetch from the object store.
    pub misses: u64,
    /// Entries evicted from the memory tier.
    pub mem_evictions: u64,
    /// Entries evicted from the disk tier.
    pub disk_evictions: u64,
    /// Calls made to `ObjectStore::fetch`.
    pub fetches: u64,
    /// Fetches that returned an error.
    pub fetch_errors: u64,
    /// Disk tier I/O errors (excluding plain not-found).
    pub disk_errors: u64,
    /// Metadata index encode/decode errors.
    pub index_errors: u64,
    /// Bytes served from the memory tier.
    pub bytes_read_from_mem: u64,
    /// Bytes served from the disk tier.
    pub bytes_read_from_disk: u64,
    /// Bytes fetched from the object store.
    pub bytes_fetched: u64,
    /// Current bytes resident in the memory tier.
    pub mem_bytes_used: u64,
    /// Current bytes resident in the disk tier.
    pub disk_bytes_used: u64,
}

impl MetricsSnapshot {
    /// Overall hit rate across all tiers, in `[0, 1]`.
    ///
    /// Returns `0.0` if there have been no requests yet.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let hits = (self.mem_hits + self.disk_hits) as f64;
        let total = hits + self.misses as f64;

        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }
}

impl Metrics {
    pub(crate) fn record_mem_hit(&self, bytes: u64) {
        self.mem_hits.fetch_add(1, Relaxed);
        self.bytes_read_from_mem.fetch_add(bytes, Relaxed);
    }

    pub(crate) fn record_disk_hit(&self, bytes: u64) {
        self.disk_hits.fetch_add(1, Relaxed);
        self.bytes_read_from_disk.fetch_add(bytes, Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_mem_eviction(&self) {
        self.mem_evictions.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_disk_eviction(&self) {
        self.disk_evictions.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_fetch(&self, bytes: u64) {
        self.fetches.fetch_add(1, Relaxed);
        self.bytes_fetched.fetch_add(bytes, Relaxed);
    }

    pub(crate) fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_disk_error(&self) {
        self.disk_errors.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_index_error(&self) {
        self.index_errors.fetch_add(1, Relaxed);
    }

    pub(crate) fn set_mem_bytes_used(&self, bytes: u64) {
        self.mem_bytes_used.store(bytes, Relaxed);
    }

    pub(crate) fn set_disk_bytes_used(&self, bytes: u64) {
        self.disk_bytes_used.store(bytes, Relaxed);
    }

    /// Takes a consistent-enough point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            mem_hits: self.mem_hits.load(Relaxed),
            disk_hits: self.disk_hits.load(Relaxed),
            misses: self.misses.load(Relaxed),
            mem_evictions: self.mem_evictions.load(Relaxed),
            disk_evictions: self.disk_evictions.load(Relaxed),
            fetches: self.fetches.load(Relaxed),
            fetch_errors: self.fetch_errors.load(Relaxed),
            disk_errors: self.disk_errors.load(Relaxed),
            index_errors: self.index_errors.load(Relaxed),
            bytes_read_from_mem: self.bytes_read_from_mem.load(Relaxed),
            bytes_read_from_disk: self.bytes_read_from_disk.load(Relaxed),
            bytes_fetched: self.bytes_fetched.load(Relaxed),
            mem_bytes_used: self.mem_bytes_used.load(Relaxed),
            disk_bytes_used: self.disk_bytes_used.load(Relaxed),
        }
    }

    /// Emits a one-line summary of the current snapshot via `log::info!`.
    ///
    /// Intended to be called periodically by the background compactor.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        log::info!(
            "cache stats: mem_hits={} disk_hits={} misses={} hit_rate={:.3} mem_bytes={} disk_bytes={}",
            s.mem_hits,
            s.disk_hits,
            s.misses,
            s.hit_rate(),
            s.mem_bytes_used,
            s.disk_bytes_used,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_with_no_requests_is_zero() {
        let m = Metrics::default();
        assert_eq!(m.snapshot().hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_computed_correctly() {
        let m = Metrics::default();
        m.record_mem_hit(10);
        m.record_mem_hit(10);
        m.record_disk_hit(5);
        m.record_miss();

        let snap = m.snapshot();
        assert_eq!(snap.mem_hits, 2);
        assert_eq!(snap.disk_hits, 1);
        assert_eq!(snap.misses, 1);
        assert!((snap.hit_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn gauges_are_overwritten_not_accumulated() {
        let m = Metrics::default();
        m.set_mem_bytes_used(100);
        m.set_mem_bytes_used(50);
        assert_eq!(m.snapshot().mem_bytes_used, 50);
    }
}
