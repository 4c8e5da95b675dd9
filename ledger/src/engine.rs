//! Core ledger engine implementation.
//!
//! Each operation runs in two phases. The preparation phase validates input,
//! resolves FX rates and acquires wallet locks; everything that can wait or
//! fail for business reasons happens here. The commit phase stages the new
//! balances, appends the journal batch and installs the balances. It contains
//! no `.await`, so an operation whose future is dropped either never reached
//! it or finished it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use borderless_common::{
    CorrelationId, Currency, CurrencyPair, IdempotencyKey, LedgerError, Money, OperationKind,
    Result, WalletId,
};
use borderless_fx::{Conversion, FxError, RateProvider};

use crate::config::LedgerConfig;
use crate::idempotency::IdempotencyCache;
use crate::journal::{InMemoryTransactionLog, JournalBatch, Transaction, TransactionLog};
use crate::lock_manager::WalletLocks;
use crate::metrics::{LedgerMetrics, MetricsSnapshot};
use crate::store::WalletStore;
use crate::wallet::{WalletSnapshot, WalletView};

/// Credit `amount` of `currency` to a wallet.
#[derive(Debug, Clone)]
pub struct DepositRequest {
    pub wallet_id: WalletId,
    pub currency: Currency,
    pub amount: Decimal,
    pub idempotency_key: Option<String>,
}

impl DepositRequest {
    pub fn new(wallet_id: WalletId, currency: Currency, amount: Decimal) -> Self {
        Self {
            wallet_id,
            currency,
            amount,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Convert `amount` of `from_currency` into `to_currency` within one wallet.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub wallet_id: WalletId,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub amount: Decimal,
    pub idempotency_key: Option<String>,
}

impl SwapRequest {
    pub fn new(
        wallet_id: WalletId,
        from_currency: Currency,
        to_currency: Currency,
        amount: Decimal,
    ) -> Self {
        Self {
            wallet_id,
            from_currency,
            to_currency,
            amount,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Move `amount` of `currency` from one wallet to another.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_wallet: WalletId,
    pub to_wallet: WalletId,
    pub currency: Currency,
    pub amount: Decimal,
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    pub fn new(from_wallet: WalletId, to_wallet: WalletId, currency: Currency, amount: Decimal) -> Self {
        Self {
            from_wallet,
            to_wallet,
            currency,
            amount,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Result of a committed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Shared by all records of the operation.
    pub correlation_id: CorrelationId,
    /// Records appended by the operation.
    pub records: Vec<Transaction>,
    /// The acting wallet after commit (the source, for transfers).
    pub wallet: WalletSnapshot,
    /// The destination wallet after commit, for transfers.
    pub counterparty: Option<WalletSnapshot>,
}

/// The ledger engine applies deposits, swaps and transfers atomically.
pub struct LedgerEngine {
    store: WalletStore,
    log: Arc<dyn TransactionLog>,
    rates: Arc<dyn RateProvider>,
    idempotency: IdempotencyCache<LedgerReceipt>,
    metrics: Arc<LedgerMetrics>,
    config: LedgerConfig,
}

impl LedgerEngine {
    /// Create a new ledger engine.
    pub fn new(
        config: LedgerConfig,
        log: Arc<dyn TransactionLog>,
        rates: Arc<dyn RateProvider>,
    ) -> Self {
        let metrics = Arc::new(LedgerMetrics::new());
        Self {
            store: WalletStore::new(config.lock.clone(), metrics.clone()),
            log,
            rates,
            idempotency: IdempotencyCache::new(config.idempotency.clone()),
            metrics,
            config,
        }
    }

    /// Create an engine backed by an in-memory transaction log.
    pub fn in_memory(config: LedgerConfig, rates: Arc<dyn RateProvider>) -> Self {
        Self::new(config, Arc::new(InMemoryTransactionLog::new()), rates)
    }

    /// Create a wallet with no balances.
    pub fn create_wallet(&self) -> WalletId {
        self.store.create_wallet()
    }

    /// Balances and history of one wallet, read under the wallet's lock so
    /// the two always agree.
    #[instrument(skip(self))]
    pub async fn get_wallet(&self, wallet_id: &WalletId) -> Result<WalletView> {
        let locks = self.store.lock_wallets(&[*wallet_id]).await?;
        let balances = locks.wallet(wallet_id)?.balances().clone();
        let transactions = self.log.list_for(wallet_id)?;
        Ok(WalletView {
            wallet_id: *wallet_id,
            balances,
            transactions,
        })
    }

    /// Every record across all wallets, in commit order.
    pub fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.log.list_all()
    }

    /// Deposit funds into a wallet.
    #[instrument(skip(self, request), fields(
        wallet_id = %request.wallet_id,
        currency = %request.currency,
        amount = %request.amount
    ))]
    pub async fn deposit(&self, request: DepositRequest) -> Result<LedgerReceipt> {
        self.idempotent(
            OperationKind::Deposit,
            request.idempotency_key.clone(),
            self.apply_deposit(&request),
        )
        .await
    }

    /// Swap between two currencies of one wallet.
    #[instrument(skip(self, request), fields(
        wallet_id = %request.wallet_id,
        from = %request.from_currency,
        to = %request.to_currency,
        amount = %request.amount
    ))]
    pub async fn swap(&self, request: SwapRequest) -> Result<LedgerReceipt> {
        self.idempotent(
            OperationKind::Swap,
            request.idempotency_key.clone(),
            self.apply_swap(&request),
        )
        .await
    }

    /// Transfer funds between two wallets.
    #[instrument(skip(self, request), fields(
        from_wallet = %request.from_wallet,
        to_wallet = %request.to_wallet,
        currency = %request.currency,
        amount = %request.amount
    ))]
    pub async fn transfer(&self, request: TransferRequest) -> Result<LedgerReceipt> {
        self.idempotent(
            OperationKind::Transfer,
            request.idempotency_key.clone(),
            self.apply_transfer(&request),
        )
        .await
    }

    /// Number of wallets created so far.
    pub fn wallet_count(&self) -> usize {
        self.store.len()
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &WalletStore {
        &self.store
    }

    /// Get current metrics snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Drop expired idempotency results.
    pub fn cleanup(&self) {
        self.idempotency.evict_expired();
    }

    /// Run cleanup periodically. Never returns.
    pub async fn run_cleanup_loop(&self, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            self.cleanup();
        }
    }

    // --- Private methods ---

    async fn apply_deposit(&self, request: &DepositRequest) -> Result<LedgerReceipt> {
        let money = Money::positive(request.amount, request.currency)?;
        let mut locks = self.store.lock_wallets(&[request.wallet_id]).await?;

        let batch = JournalBatch::deposit(request.wallet_id, money);
        let correlation_id = batch.correlation_id;
        let records = self.commit(&mut locks, batch)?;

        info!(correlation_id = %correlation_id, "Deposit committed");

        Ok(LedgerReceipt {
            correlation_id,
            records,
            wallet: locks.wallet(&request.wallet_id)?.snapshot(),
            counterparty: None,
        })
    }

    async fn apply_swap(&self, request: &SwapRequest) -> Result<LedgerReceipt> {
        let money = Money::positive(request.amount, request.from_currency)?;
        if request.from_currency == request.to_currency {
            return Err(LedgerError::validation(
                "from_currency and to_currency must differ",
                "to_currency",
            ));
        }
        if !self.store.contains(&request.wallet_id) {
            return Err(LedgerError::WalletNotFound(request.wallet_id.to_string()));
        }

        // Resolve the rate before locking so a slow provider never holds up
        // other operations on this wallet.
        let pair = CurrencyPair::new(request.from_currency, request.to_currency);
        let rate = self
            .rates
            .get_rate(&pair)
            .await
            .map_err(|e| Self::rate_error(pair, e))?;
        debug!(pair = %pair, rate = %rate.rate, source = %rate.source, "Rate resolved");
        let conversion = Conversion::execute(money, rate).map_err(|e| Self::rate_error(pair, e))?;

        let mut locks = self.store.lock_wallets(&[request.wallet_id]).await?;

        let batch = JournalBatch::swap(request.wallet_id, conversion.input, conversion.output);
        let correlation_id = batch.correlation_id;
        let records = self.commit(&mut locks, batch)?;

        info!(
            correlation_id = %correlation_id,
            credit = %conversion.output,
            rate = %conversion.rate.rate,
            "Swap committed"
        );

        Ok(LedgerReceipt {
            correlation_id,
            records,
            wallet: locks.wallet(&request.wallet_id)?.snapshot(),
            counterparty: None,
        })
    }

    async fn apply_transfer(&self, request: &TransferRequest) -> Result<LedgerReceipt> {
        let money = Money::positive(request.amount, request.currency)?;
        if request.from_wallet == request.to_wallet {
            return Err(LedgerError::validation(
                "Cannot transfer to the same wallet",
                "to_wallet",
            ));
        }

        let mut locks = self
            .store
            .lock_wallets(&[request.from_wallet, request.to_wallet])
            .await?;

        let batch = JournalBatch::transfer(request.from_wallet, request.to_wallet, money);
        let correlation_id = batch.correlation_id;
        let records = self.commit(&mut locks, batch)?;

        info!(correlation_id = %correlation_id, "Transfer committed");

        Ok(LedgerReceipt {
            correlation_id,
            records,
            wallet: locks.wallet(&request.from_wallet)?.snapshot(),
            counterparty: Some(locks.wallet(&request.to_wallet)?.snapshot()),
        })
    }

    /// Stage every wallet's new balances, append the batch, then install the
    /// balances. Any failure before the append leaves everything untouched;
    /// nothing after the append can fail.
    fn commit(&self, locks: &mut WalletLocks, batch: JournalBatch) -> Result<Vec<Transaction>> {
        let held = locks.ids();
        debug_assert!(batch.entries.iter().all(|e| held.contains(&e.wallet_id)));

        let mut staged = Vec::with_capacity(held.len());
        for id in held {
            let deltas = batch.deltas_for(&id);
            if deltas.is_empty() {
                continue;
            }
            let balances = locks.wallet(&id)?.preview(&deltas)?;
            staged.push((id, balances));
        }

        let records = self.log.append(batch)?;

        for (id, balances) in staged {
            locks.wallet_mut(&id)?.commit(balances);
        }

        Ok(records)
    }

    /// Run `op` under the idempotency slot for `key`, if any.
    async fn idempotent<Fut>(
        &self,
        kind: OperationKind,
        key: Option<String>,
        op: Fut,
    ) -> Result<LedgerReceipt>
    where
        Fut: Future<Output = Result<LedgerReceipt>>,
    {
        let Some(key) = key else {
            return self.observe(kind, op.await);
        };

        let slot = match self
            .idempotency
            .claim(IdempotencyKey::new(kind, key), self.config.lock.acquisition_timeout)
            .await
        {
            Ok(slot) => slot,
            Err(e) => return self.observe(kind, Err(e)),
        };

        if let Some(receipt) = slot.replay() {
            self.metrics.idempotent_replay();
            debug!(
                key = %slot.key(),
                correlation_id = %receipt.correlation_id,
                "Replaying idempotent result"
            );
            return Ok(receipt);
        }

        // No await between the operation finishing and the result being
        // recorded, so a committed result is never lost to cancellation.
        let result = self.observe(kind, op.await);
        if let Ok(receipt) = &result {
            slot.record(receipt.clone());
        }
        result
    }

    fn observe(&self, kind: OperationKind, result: Result<LedgerReceipt>) -> Result<LedgerReceipt> {
        match &result {
            Ok(_) => self.metrics.operation_committed(kind),
            Err(e) => {
                self.metrics.operation_failed();
                warn!(
                    operation = %kind,
                    code = e.error_code(),
                    error = %e,
                    "Operation rejected"
                );
            }
        }
        result
    }

    fn rate_error(pair: CurrencyPair, error: FxError) -> LedgerError {
        match error {
            FxError::ConversionTooSmall { .. } | FxError::ConversionOverflow { .. } => {
                LedgerError::validation(error.to_string(), "amount")
            }
            other => LedgerError::RateUnavailable {
                from: pair.base,
                to: pair.quote,
                reason: other.to_string(),
            },
        }
    }
}
