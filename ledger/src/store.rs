//! Wallet storage.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use borderless_common::{Currency, LedgerError, Result, WalletId};

use crate::config::LockConfig;
use crate::lock_manager::{LockManager, WalletCell, WalletLocks};
use crate::metrics::LedgerMetrics;
use crate::wallet::Wallet;

/// Owns every wallet. Each wallet sits behind its own mutex, so operations
/// on different wallets never contend.
pub struct WalletStore {
    wallets: DashMap<WalletId, WalletCell>,
    locks: LockManager,
    metrics: Arc<LedgerMetrics>,
}

impl WalletStore {
    /// Create an empty store.
    pub fn new(config: LockConfig, metrics: Arc<LedgerMetrics>) -> Self {
        Self {
            wallets: DashMap::new(),
            locks: LockManager::new(config, metrics.clone()),
            metrics,
        }
    }

    /// Allocate a fresh wallet with no balances.
    pub fn create_wallet(&self) -> WalletId {
        let id = WalletId::new();
        self.wallets
            .insert(id, Arc::new(Mutex::new(Wallet::new(id))));
        self.metrics.wallet_created();
        info!(wallet_id = %id, "Wallet created");
        id
    }

    /// Check if a wallet exists.
    pub fn contains(&self, id: &WalletId) -> bool {
        self.wallets.contains_key(id)
    }

    /// Number of wallets.
    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Lock the given wallets for an operation.
    pub async fn lock_wallets(&self, ids: &[WalletId]) -> Result<WalletLocks> {
        let cells = ids
            .iter()
            .map(|id| {
                self.wallets
                    .get(id)
                    .map(|cell| (*id, cell.value().clone()))
                    .ok_or_else(|| LedgerError::WalletNotFound(id.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        self.locks.acquire(cells).await
    }

    /// Current state of a wallet.
    pub async fn get_wallet(&self, id: &WalletId) -> Result<Wallet> {
        let locks = self.lock_wallets(&[*id]).await?;
        let wallet = locks.wallet(id)?.clone();
        Ok(wallet)
    }

    /// Add a signed delta to one balance under the wallet's lock.
    /// Returns the new balance.
    pub async fn apply_delta(
        &self,
        id: &WalletId,
        currency: Currency,
        delta: Decimal,
    ) -> Result<Decimal> {
        let mut locks = self.lock_wallets(&[*id]).await?;
        let balance = locks.wallet_mut(id)?.apply_delta(currency, delta)?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn store() -> WalletStore {
        WalletStore::new(LockConfig::default(), Arc::new(LedgerMetrics::new()))
    }

    #[tokio::test]
    async fn test_create_and_get_wallet() {
        let store = store();
        let id = store.create_wallet();

        let wallet = store.get_wallet(&id).await.unwrap();
        assert_eq!(wallet.id, id);
        assert!(wallet.balances().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_wallet_not_found() {
        let store = store();
        let id = WalletId::new();

        assert!(matches!(
            store.get_wallet(&id).await,
            Err(LedgerError::WalletNotFound(_))
        ));
        assert!(matches!(
            store.apply_delta(&id, Currency::Usdx, dec!(1)).await,
            Err(LedgerError::WalletNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_delta_rejects_overdraft() {
        let store = store();
        let id = store.create_wallet();

        assert_eq!(
            store.apply_delta(&id, Currency::Usdx, dec!(100)).await.unwrap(),
            dec!(100)
        );
        assert!(matches!(
            store.apply_delta(&id, Currency::Usdx, dec!(-100.01)).await,
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(
            store.get_wallet(&id).await.unwrap().balance(Currency::Usdx),
            dec!(100)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deltas_are_not_lost() {
        let store = Arc::new(store());
        let id = store.create_wallet();

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.apply_delta(&id, Currency::Cngn, dec!(1.25)).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let wallet = store.get_wallet(&id).await.unwrap();
        assert_eq!(wallet.balance(Currency::Cngn), dec!(250));
    }
}
