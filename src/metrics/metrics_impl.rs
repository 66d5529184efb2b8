use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::snapshot::MetricsSnapshot;

/// Monotonic operation counters for a priority LRU cache.
///
/// All counters are relaxed atomics: recording paths that only hold the
/// cache's read lock (the probe path bumps the conflict counter) must be
/// able to increment without tearing, and snapshot readers must observe
/// monotone values.
#[derive(Debug, Default)]
pub struct PriorityLruMetrics {
    inserts: AtomicU64,
    evictions: AtomicU64,
    removals: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    conflicts: AtomicU64,
    errors: AtomicU64,
}

impl PriorityLruMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the counters into a plain snapshot, attaching the gauges.
    pub fn snapshot(&self, len: usize, capacity: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            len,
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = PriorityLruMetrics::new();
        let snap = metrics.snapshot(0, 8);
        assert_eq!(snap.inserts, 0);
        assert_eq!(snap.evictions, 0);
        assert_eq!(snap.removals, 0);
        assert_eq!(snap.hits, 0);
        assert_eq!(snap.misses, 0);
        assert_eq!(snap.conflicts, 0);
        assert_eq!(snap.errors, 0);
        assert_eq!(snap.capacity, 8);
    }

    #[test]
    fn record_methods_increment_their_counter() {
        let metrics = PriorityLruMetrics::new();
        metrics.record_insert();
        metrics.record_insert();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_conflict();
        metrics.record_error();
        metrics.record_eviction();
        metrics.record_removal();

        let snap = metrics.snapshot(2, 8);
        assert_eq!(snap.inserts, 2);
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.conflicts, 1);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.evictions, 1);
        assert_eq!(snap.removals, 1);
        assert_eq!(snap.len, 2);
    }

    #[test]
    fn recording_works_through_a_shared_reference() {
        let metrics = PriorityLruMetrics::new();
        let shared = &metrics;
        shared.record_conflict();
        assert_eq!(metrics.snapshot(0, 1).conflicts, 1);
    }
}
