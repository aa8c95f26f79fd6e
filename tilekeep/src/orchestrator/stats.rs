//! Counters for the tile path.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by the orchestrator and its refresh tasks.
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes_stored: AtomicU64,
    refreshes_not_ok: AtomicU64,
    refresh_failures: AtomicU64,
    fallbacks: AtomicU64,
    storage_errors: AtomicU64,
}

/// Point-in-time copy of [`OrchestratorStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorStatsSnapshot {
    /// Requests answered from the tile partition without waiting
    pub hits: u64,
    /// Requests that had to wait on the network
    pub misses: u64,
    /// Refreshes that wrote a 200 response back
    pub refreshes_stored: u64,
    /// Refreshes that got a non-200 answer (never written)
    pub refreshes_not_ok: u64,
    /// Refreshes that failed at the transport level
    pub refresh_failures: u64,
    /// Misses rescued by an entry that appeared while the fetch was failing
    pub fallbacks: u64,
    /// Storage reads or writes that failed and were degraded around
    pub storage_errors: u64,
}

impl OrchestratorStatsSnapshot {
    /// Fraction of requests served straight from the partition (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl OrchestratorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stored(&self) {
        self.refreshes_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_not_ok(&self) {
        self.refreshes_not_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_storage_error(&self) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OrchestratorStatsSnapshot {
        OrchestratorStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes_stored: self.refreshes_stored.load(Ordering::Relaxed),
            refreshes_not_ok: self.refreshes_not_ok.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }
}
