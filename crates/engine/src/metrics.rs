use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters tracking remediation outcomes.
///
/// All counters use relaxed ordering. For a consistent point-in-time view,
/// call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Issues handed to the orchestrator.
    pub received: AtomicU64,
    /// Issues with no applicable action.
    pub no_action: AtomicU64,
    /// Requests suppressed by the dedup window.
    pub deduplicated: AtomicU64,
    /// Requests refused by a token bucket.
    pub rate_limited: AtomicU64,
    /// Approvals opened.
    pub approvals_requested: AtomicU64,
    /// Approvals granted.
    pub approved: AtomicU64,
    /// Approvals rejected.
    pub rejected: AtomicU64,
    /// Approvals that reached their deadline.
    pub timed_out: AtomicU64,
    /// Approvals cancelled because the issue was resolved.
    pub cancelled: AtomicU64,
    /// Actions executed successfully.
    pub executed: AtomicU64,
    /// Actions that failed (retries exhausted, circuit open, no executor).
    pub failed: AtomicU64,
    /// Calls rejected because a circuit was open.
    pub circuit_open: AtomicU64,
    /// Raw failures reported by executors and notifiers.
    pub dependency_failures: AtomicU64,
    /// Outcome or approval notifications that could not be delivered.
    pub notifications_failed: AtomicU64,
    /// Successful rollbacks.
    pub rolled_back: AtomicU64,
    /// Failed rollbacks.
    pub rollback_failed: AtomicU64,
}

impl EngineMetrics {
    pub fn increment_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_no_action(&self) {
        self.no_action.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_approvals_requested(&self) {
        self.approvals_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_approved(&self) {
        self.approved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_circuit_open(&self) {
        self.circuit_open.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dependency_failures(&self) {
        self.dependency_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notifications_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rolled_back(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rollback_failed(&self) {
        self.rollback_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            no_action: self.no_action.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            approvals_requested: self.approvals_requested.load(Ordering::Relaxed),
            approved: self.approved.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            circuit_open: self.circuit_open.load(Ordering::Relaxed),
            dependency_failures: self.dependency_failures.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            rollback_failed: self.rollback_failed.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`EngineMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub no_action: u64,
    pub deduplicated: u64,
    pub rate_limited: u64,
    pub approvals_requested: u64,
    pub approved: u64,
    pub rejected: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub executed: u64,
    pub failed: u64,
    pub circuit_open: u64,
    pub dependency_failures: u64,
    pub notifications_failed: u64,
    pub rolled_back: u64,
    pub rollback_failed: u64,
}
