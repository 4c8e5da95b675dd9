//! Ledger metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use borderless_common::OperationKind;
use serde::Serialize;

/// Operation and contention counters.
#[derive(Debug, Default)]
pub struct LedgerMetrics {
    /// Wallets created.
    pub wallets_created: AtomicU64,
    /// Committed deposits.
    pub deposits: AtomicU64,
    /// Committed swaps.
    pub swaps: AtomicU64,
    /// Committed transfers.
    pub transfers: AtomicU64,
    /// Operations that returned an error.
    pub operations_failed: AtomicU64,
    /// Wallet locks acquired.
    pub locks_acquired: AtomicU64,
    /// Lock acquisitions that timed out.
    pub lock_timeouts: AtomicU64,
    /// Results served from the idempotency window.
    pub idempotent_replays: AtomicU64,
}

impl LedgerMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record wallet creation.
    pub fn wallet_created(&self) {
        self.wallets_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed operation.
    pub fn operation_committed(&self, kind: OperationKind) {
        let counter = match kind {
            OperationKind::Deposit => &self.deposits,
            OperationKind::Swap => &self.swaps,
            OperationKind::Transfer => &self.transfers,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed operation.
    pub fn operation_failed(&self) {
        self.operations_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record lock acquisition.
    pub fn lock_acquired(&self) {
        self.locks_acquired.fetch_add(1, Ordering::Relaxed);
    }

    /// Record lock timeout.
    pub fn lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an idempotent replay.
    pub fn idempotent_replay(&self) {
        self.idempotent_replays.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            wallets_created: self.wallets_created.load(Ordering::Relaxed),
            deposits: self.deposits.load(Ordering::Relaxed),
            swaps: self.swaps.load(Ordering::Relaxed),
            transfers: self.transfers.load(Ordering::Relaxed),
            operations_failed: self.operations_failed.load(Ordering::Relaxed),
            locks_acquired: self.locks_acquired.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            idempotent_replays: self.idempotent_replays.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub wallets_created: u64,
    pub deposits: u64,
    pub swaps: u64,
    pub transfers: u64,
    pub operations_failed: u64,
    pub locks_acquired: u64,
    pub lock_timeouts: u64,
    pub idempotent_replays: u64,
}

impl MetricsSnapshot {
    /// Committed operations of all kinds.
    pub fn operations_committed(&self) -> u64 {
        self.deposits + self.swaps + self.transfers
    }
}
