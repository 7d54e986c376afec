//! Operation counters and their snapshots.
//!
//! Counters use `AtomicU64` with `Relaxed` ordering: increments are
//! low-overhead, and exactness across threads matters less than never
//! touching a lock on the hot path. Snapshots are plain `Copy` structs taken
//! field-by-field; a snapshot is internally consistent enough for dashboards
//! and tests, not a linearizable cut.
//!
//! ## Key Components
//!
//! | Type            | Role                                            |
//! |-----------------|-------------------------------------------------|
//! | `CacheCounters` | Per-cache recorder (hits, misses, evictions)    |
//! | `CacheStats`    | Snapshot of a `CacheCounters`                   |
//! | `GroupCounters` | Per-group recorder (miss-path attribution)      |
//! | `GroupStats`    | Snapshot of a `GroupCounters`                   |

use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Cache-level counters
// =============================================================================

/// Recorder attached to one concurrent cache.
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    evictions: AtomicU64,
}

impl CacheCounters {
    #[inline]
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn evictions_add(&self, n: u64) {
        self.evictions.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of one cache's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the store.
    pub hits: u64,
    /// Lookups that found nothing (including before first write).
    pub misses: u64,
    /// New keys written.
    pub inserts: u64,
    /// Existing keys overwritten.
    pub updates: u64,
    /// Entries removed by budget pressure.
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups answered locally, in `[0, 1]`.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Group-level counters
// =============================================================================

/// Recorder attached to one group, attributing each miss to its resolution.
#[derive(Debug, Default)]
pub(crate) struct GroupCounters {
    gets: AtomicU64,
    local_hits: AtomicU64,
    peer_hits: AtomicU64,
    peer_failures: AtomicU64,
    loads: AtomicU64,
    loader_errors: AtomicU64,
}

impl GroupCounters {
    #[inline]
    pub(crate) fn get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn peer_hit(&self) {
        self.peer_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn peer_failure(&self) {
        self.peer_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn loader_error(&self) {
        self.loader_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> GroupStats {
        GroupStats {
            gets: self.gets.load(Ordering::Relaxed),
            local_hits: self.local_hits.load(Ordering::Relaxed),
            peer_hits: self.peer_hits.load(Ordering::Relaxed),
            peer_failures: self.peer_failures.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            loader_errors: self.loader_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of one group's request flow.
///
/// `gets == local_hits + (requests that entered the miss path)`; the miss
/// path resolves as a peer hit, a loader call, or an error. Coalesced
/// waiters count toward `gets` but not toward `peer_hits`/`loads`, which
/// count upstream executions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    /// Total `get` calls accepted (non-empty key).
    pub gets: u64,
    /// Answered from this node's cache.
    pub local_hits: u64,
    /// Answered by a remote peer fetch.
    pub peer_hits: u64,
    /// Remote peer fetches that failed and fell back to the loader.
    pub peer_failures: u64,
    /// Loader executions.
    pub loads: u64,
    /// Loader executions that returned an error.
    pub loader_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_snapshot_reflects_increments() {
        let counters = CacheCounters::default();
        counters.hit();
        counters.hit();
        counters.miss();
        counters.insert();
        counters.update();
        counters.evictions_add(3);

        let stats = counters.snapshot();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.evictions, 3);
    }

    #[test]
    fn hit_ratio_handles_empty_and_mixed() {
        assert_eq!(CacheStats::default().hit_ratio(), 0.0);

        let counters = CacheCounters::default();
        counters.hit();
        counters.miss();
        counters.miss();
        counters.miss();
        assert!((counters.snapshot().hit_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn group_snapshot_reflects_increments() {
        let counters = GroupCounters::default();
        counters.get();
        counters.get();
        counters.local_hit();
        counters.peer_failure();
        counters.load();

        let stats = counters.snapshot();
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.local_hits, 1);
        assert_eq!(stats.peer_hits, 0);
        assert_eq!(stats.peer_failures, 1);
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.loader_errors, 0);
    }
}
