//! Operational counters for one book.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Running operation counters, updated on every public book operation,
/// including rejected ones.
#[derive(Debug, Default)]
pub struct BookStats {
    pub(crate) orders_added: AtomicU64,
    pub(crate) orders_cancelled: AtomicU64,
    pub(crate) orders_modified: AtomicU64,
    pub(crate) orders_rejected: AtomicU64,
    pub(crate) trades_executed: AtomicU64,
    pub(crate) volume_matched: AtomicU64,
    pub(crate) cumulative_latency_ns: AtomicU64,
}

impl BookStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> BookStatsSnapshot {
        BookStatsSnapshot {
            orders_added: self.orders_added.load(Ordering::Relaxed),
            orders_cancelled: self.orders_cancelled.load(Ordering::Relaxed),
            orders_modified: self.orders_modified.load(Ordering::Relaxed),
            orders_rejected: self.orders_rejected.load(Ordering::Relaxed),
            trades_executed: self.trades_executed.load(Ordering::Relaxed),
            volume_matched: self.volume_matched.load(Ordering::Relaxed),
            cumulative_latency_ns: self.cumulative_latency_ns.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn record_add(&self) {
        self.orders_added.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_cancel(&self) {
        self.orders_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_modify(&self) {
        self.orders_modified.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reject(&self) {
        self.orders_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_trade(&self, quantity: u64) {
        self.trades_executed.fetch_add(1, Ordering::Relaxed);
        self.volume_matched.fetch_add(quantity, Ordering::Relaxed);
    }

    /// Accumulate wall-clock time spent inside a public operation. Purely
    /// observational; simulation time comes from the event stream.
    #[inline]
    pub(crate) fn record_latency(&self, elapsed: std::time::Duration) {
        self.cumulative_latency_ns
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }
}

/// Plain-value view of [`BookStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookStatsSnapshot {
    /// Orders accepted by `add_order`
    pub orders_added: u64,
    /// Orders removed by `cancel_order`
    pub orders_cancelled: u64,
    /// Successful `modify_order` calls
    pub orders_modified: u64,
    /// Operations rejected by validation
    pub orders_rejected: u64,
    /// Individual executions emitted by the matcher
    pub trades_executed: u64,
    /// Total quantity matched across all executions
    pub volume_matched: u64,
    /// Wall-clock nanoseconds spent inside public operations
    pub cumulative_latency_ns: u64,
}
