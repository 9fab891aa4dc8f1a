//! Atomic cache statistics with cache-line alignment
//!
//! Lock-free counters shared by the coordinator and the invalidation
//! listener. The `remote_calls` counter is the externally-observable proof of
//! cache-hit behavior: a fully-cached read leaves it untouched.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Atomic statistics for one coordinator instance.
#[derive(Debug)]
#[repr(align(64))]
pub struct CacheStatistics {
    /// Fields answered from the local cache
    hits: CachePadded<AtomicU64>,
    /// Fields that required the remote store
    misses: CachePadded<AtomicU64>,
    /// Remote round trips issued (batched fetches count once)
    remote_calls: CachePadded<AtomicU64>,
    /// Invalidation notifications received from the channel
    invalidations_received: CachePadded<AtomicU64>,
    /// Value-carrying invalidations applied in place of an eviction
    invalidations_applied: CachePadded<AtomicU64>,
    /// Self-originated notifications dropped by the listener
    self_suppressed: CachePadded<AtomicU64>,
    /// Entries removed by invalidation, expiry or capacity pressure
    evictions: CachePadded<AtomicU64>,
    /// Whole-cache flushes (disconnect recovery or explicit)
    flushes: CachePadded<AtomicU64>,
}

impl CacheStatistics {
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            hits: CachePadded::new(AtomicU64::new(0)),
            misses: CachePadded::new(AtomicU64::new(0)),
            remote_calls: CachePadded::new(AtomicU64::new(0)),
            invalidations_received: CachePadded::new(AtomicU64::new(0)),
            invalidations_applied: CachePadded::new(AtomicU64::new(0)),
            self_suppressed: CachePadded::new(AtomicU64::new(0)),
            evictions: CachePadded::new(AtomicU64::new(0)),
            flushes: CachePadded::new(AtomicU64::new(0)),
        }
    }

    #[inline(always)]
    pub fn record_hits(&self, count: u64) {
        self.hits.fetch_add(count, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_misses(&self, count: u64) {
        self.misses.fetch_add(count, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_remote_call(&self) {
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_invalidation_received(&self) {
        self.invalidations_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_invalidation_applied(&self) {
        self.invalidations_applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_self_suppressed(&self) {
        self.self_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Monotonic count of remote round trips issued so far.
    #[inline(always)]
    pub fn remote_calls(&self) -> u64 {
        self.remote_calls.load(Ordering::Relaxed)
    }

    /// Consistent-enough point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> CacheStatisticsSnapshot {
        CacheStatisticsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
            invalidations_received: self.invalidations_received.load(Ordering::Relaxed),
            invalidations_applied: self.invalidations_applied.load(Ordering::Relaxed),
            self_suppressed: self.self_suppressed.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}

impl Default for CacheStatistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the coordinator's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatisticsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub remote_calls: u64,
    pub invalidations_received: u64,
    pub invalidations_applied: u64,
    pub self_suppressed: u64,
    pub evictions: u64,
    pub flushes: u64,
}

impl CacheStatisticsSnapshot {
    /// Field-level hit rate (0.0-1.0). Returns 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
