//! Lifetime counters maintained by the pool.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters updated on the dispatch paths. Relaxed ordering
/// throughout: these are metrics, not synchronization.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted: AtomicU64,
    pub executed: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub rejected: AtomicU64,
    pub promotions: AtomicU64,
}

impl PoolCounters {
    pub fn snapshot(&self, queued: usize) -> PoolStats {
        PoolStats {
            queued,
            submitted: self.submitted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the pool's lifetime counters.
///
/// Accounting invariant once the pool has shut down:
/// `executed + failed + cancelled == submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Records currently waiting in the heap.
    pub queued: usize,
    /// Accepted submissions.
    pub submitted: u64,
    /// Payloads that ran to completion successfully.
    pub executed: u64,
    /// Payloads that ran and returned an error or panicked.
    pub failed: u64,
    /// Records discarded unexecuted at shutdown.
    pub cancelled: u64,
    /// Submissions refused because shutdown had begun.
    pub rejected: u64,
    /// Individual priority promotions applied by the aging monitor.
    pub promotions: u64,
}
