//! Observability metrics for admission control.
//!
//! Provides counters about admission behavior for monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking admission statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Requests admitted by the counter
    admitted: AtomicU64,
    /// Requests denied by the counter
    denied: AtomicU64,
    /// Requests decided by a failure mode instead of the counter
    degraded: AtomicU64,
    /// Counter store operations that failed
    store_failures: AtomicU64,
    /// Expired counters removed by scavenging
    scavenged: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_admitted(&self) {
        self.inner.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self) {
        self.inner.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_degraded(&self) {
        self.inner.degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_failure(&self) {
        self.inner.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scavenged(&self, count: usize) {
        self.inner
            .scavenged
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Total requests admitted (including fail-open admissions).
    pub fn admitted(&self) -> u64 {
        self.inner.admitted.load(Ordering::Relaxed)
    }

    /// Total requests denied (including fail-closed denials).
    pub fn denied(&self) -> u64 {
        self.inner.denied.load(Ordering::Relaxed)
    }

    /// Total requests decided by a failure mode.
    pub fn degraded(&self) -> u64 {
        self.inner.degraded.load(Ordering::Relaxed)
    }

    /// Total failed store operations.
    pub fn store_failures(&self) -> u64 {
        self.inner.store_failures.load(Ordering::Relaxed)
    }

    /// Total expired counters removed.
    pub fn scavenged(&self) -> u64 {
        self.inner.scavenged.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            admitted: self.admitted(),
            denied: self.denied(),
            degraded: self.degraded(),
            store_failures: self.store_failures(),
            scavenged: self.scavenged(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.admitted.store(0, Ordering::Relaxed);
        self.inner.denied.store(0, Ordering::Relaxed);
        self.inner.degraded.store(0, Ordering::Relaxed);
        self.inner.store_failures.store(0, Ordering::Relaxed);
        self.inner.scavenged.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Requests admitted
    pub admitted: u64,
    /// Requests denied
    pub denied: u64,
    /// Requests decided by a failure mode
    pub degraded: u64,
    /// Failed store operations
    pub store_failures: u64,
    /// Expired counters removed
    pub scavenged: u64,
}

impl MetricsSnapshot {
    /// Total decisions made (admitted + denied).
    pub fn total_decisions(&self) -> u64 {
        self.admitted.saturating_add(self.denied)
    }

    /// Fraction of decisions that were denials (0.0 to 1.0).
    ///
    /// Returns 0.0 if no decisions have been made.
    pub fn denial_rate(&self) -> f64 {
        let total = self.total_decisions();
        if total == 0 {
            0.0
        } else {
            self.denied as f64 / total as f64
        }
    }
}
