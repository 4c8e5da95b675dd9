//! Per-wallet lock acquisition.
//!
//! Every balance read or write of a wallet happens while holding that
//! wallet's mutex. Operations touching several wallets take all their locks
//! up front, in ascending [`WalletId`] order, under one shared deadline.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::warn;

use borderless_common::{LedgerError, Result, WalletId};

use crate::config::LockConfig;
use crate::metrics::LedgerMetrics;
use crate::wallet::Wallet;

/// Shared cell holding one wallet.
pub type WalletCell = Arc<Mutex<Wallet>>;

/// Wallets locked for one operation, in ascending id order.
pub struct WalletLocks {
    guards: Vec<OwnedMutexGuard<Wallet>>,
}

impl WalletLocks {
    /// Borrow a locked wallet.
    pub fn wallet(&self, id: &WalletId) -> Result<&Wallet> {
        self.guards
            .iter()
            .find(|g| &g.id == id)
            .map(|g| &**g)
            .ok_or_else(|| LedgerError::WalletNotFound(id.to_string()))
    }

    /// Mutably borrow a locked wallet.
    pub fn wallet_mut(&mut self, id: &WalletId) -> Result<&mut Wallet> {
        self.guards
            .iter_mut()
            .find(|g| &g.id == id)
            .map(|g| &mut **g)
            .ok_or_else(|| LedgerError::WalletNotFound(id.to_string()))
    }

    /// Ids held, in acquisition order.
    pub fn ids(&self) -> Vec<WalletId> {
        self.guards.iter().map(|g| g.id).collect()
    }
}

/// Acquires wallet locks with a bounded wait.
pub struct LockManager {
    config: LockConfig,
    metrics: Arc<LedgerMetrics>,
}

impl LockManager {
    /// Create a new lock manager.
    pub fn new(config: LockConfig, metrics: Arc<LedgerMetrics>) -> Self {
        Self { config, metrics }
    }

    /// Lock every given wallet. Duplicates are locked once.
    ///
    /// Fails with `Busy` if the whole set is not held before the acquisition
    /// timeout; locks taken so far are released on failure.
    pub async fn acquire(&self, mut cells: Vec<(WalletId, WalletCell)>) -> Result<WalletLocks> {
        cells.sort_by_key(|(id, _)| *id);
        cells.dedup_by_key(|(id, _)| *id);

        let deadline = Instant::now() + self.config.acquisition_timeout;
        let mut guards = Vec::with_capacity(cells.len());

        for (id, cell) in cells {
            match tokio::time::timeout_at(deadline, cell.lock_owned()).await {
                Ok(guard) => {
                    self.metrics.lock_acquired();
                    guards.push(guard);
                }
                Err(_) => {
                    self.metrics.lock_timeout();
                    warn!(
                        wallet_id = %id,
                        timeout_ms = self.config.acquisition_timeout.as_millis() as u64,
                        "Wallet lock acquisition timed out"
                    );
                    return Err(LedgerError::Busy {
                        resource: format!("wallet {id}"),
                        retry_after_ms: self.config.busy_retry_after_ms,
                    });
                }
            }
        }

        Ok(WalletLocks { guards })
    }
}
