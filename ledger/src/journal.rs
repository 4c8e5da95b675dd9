//! Transaction records and the append-only transaction log.

use std::collections::HashMap;

use borderless_common::{
    Balances, CorrelationId, Currency, LedgerError, Money, Result, Timestamp, TransactionId,
    WalletId,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a record did to its wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    SwapOut,
    SwapIn,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    /// Whether the record reduced the wallet's balance.
    pub fn is_debit(&self) -> bool {
        matches!(self, TransactionKind::SwapOut | TransactionKind::TransferOut)
    }
}

/// The other side of a record: the opposite wallet of a transfer or the
/// opposite currency of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counterparty {
    Wallet(WalletId),
    Currency(Currency),
}

/// A committed, immutable transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Log-wide sequence number.
    pub id: TransactionId,
    /// Shared by every record of one operation.
    pub correlation_id: CorrelationId,
    /// Wallet the record belongs to.
    pub wallet_id: WalletId,
    pub kind: TransactionKind,
    pub currency: Currency,
    /// Always positive; direction comes from `kind`.
    pub amount: Decimal,
    pub counterparty: Option<Counterparty>,
    /// Commit time; non-decreasing in `id` order.
    pub timestamp: Timestamp,
}

impl Transaction {
    /// Signed effect on the wallet's balance.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_debit() {
            -self.amount
        } else {
            self.amount
        }
    }
}

/// A record waiting for an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub wallet_id: WalletId,
    pub kind: TransactionKind,
    pub money: Money,
    pub counterparty: Option<Counterparty>,
}

/// The records of one operation; appended together or not at all.
#[derive(Debug, Clone)]
pub struct JournalBatch {
    pub correlation_id: CorrelationId,
    pub entries: Vec<PendingEntry>,
}

impl JournalBatch {
    /// A single deposit record.
    pub fn deposit(wallet_id: WalletId, money: Money) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            entries: vec![PendingEntry {
                wallet_id,
                kind: TransactionKind::Deposit,
                money,
                counterparty: None,
            }],
        }
    }

    /// `swap_out` of `debit` and `swap_in` of `credit` on one wallet.
    pub fn swap(wallet_id: WalletId, debit: Money, credit: Money) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            entries: vec![
                PendingEntry {
                    wallet_id,
                    kind: TransactionKind::SwapOut,
                    money: debit,
                    counterparty: Some(Counterparty::Currency(credit.currency)),
                },
                PendingEntry {
                    wallet_id,
                    kind: TransactionKind::SwapIn,
                    money: credit,
                    counterparty: Some(Counterparty::Currency(debit.currency)),
                },
            ],
        }
    }

    /// `transfer_out` on `from` and `transfer_in` on `to`.
    pub fn transfer(from: WalletId, to: WalletId, money: Money) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            entries: vec![
                PendingEntry {
                    wallet_id: from,
                    kind: TransactionKind::TransferOut,
                    money,
                    counterparty: Some(Counterparty::Wallet(to)),
                },
                PendingEntry {
                    wallet_id: to,
                    kind: TransactionKind::TransferIn,
                    money,
                    counterparty: Some(Counterparty::Wallet(from)),
                },
            ],
        }
    }

    /// Net balance change per currency across all wallets in the batch.
    pub fn net_flow(&self) -> Balances {
        let mut net = Balances::new();
        for entry in &self.entries {
            let signed = if entry.kind.is_debit() {
                -entry.money.value
            } else {
                entry.money.value
            };
            *net.entry(entry.money.currency).or_insert(Decimal::ZERO) += signed;
        }
        net.retain(|_, v| !v.is_zero());
        net
    }

    /// Balance deltas for one wallet.
    pub fn deltas_for(&self, wallet_id: &WalletId) -> Vec<(Currency, Decimal)> {
        self.entries
            .iter()
            .filter(|e| &e.wallet_id == wallet_id)
            .map(|e| {
                let signed = if e.kind.is_debit() {
                    -e.money.value
                } else {
                    e.money.value
                };
                (e.money.currency, signed)
            })
            .collect()
    }
}

/// Append-only, ordered store of transaction records.
///
/// `append` is called inside the commit section while wallet locks are held
/// and must not block on anything slow.
pub trait TransactionLog: Send + Sync {
    /// Assign ids and timestamps to every entry and store them atomically.
    fn append(&self, batch: JournalBatch) -> Result<Vec<Transaction>>;

    /// History of one wallet, oldest first.
    fn list_for(&self, wallet_id: &WalletId) -> Result<Vec<Transaction>>;

    /// Every record across all wallets, in commit order.
    fn list_all(&self) -> Result<Vec<Transaction>>;
}

#[derive(Debug, Default)]
struct LogState {
    records: Vec<Transaction>,
    by_wallet: HashMap<WalletId, Vec<usize>>,
    last_id: u64,
    last_timestamp: Option<Timestamp>,
}

/// In-memory transaction log.
#[derive(Debug, Default)]
pub struct InMemoryTransactionLog {
    state: RwLock<LogState>,
}

impl InMemoryTransactionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionLog for InMemoryTransactionLog {
    fn append(&self, batch: JournalBatch) -> Result<Vec<Transaction>> {
        if batch.entries.is_empty() {
            return Err(LedgerError::StorageFault("empty journal batch".to_string()));
        }

        let mut state = self.state.write();
        let timestamp = borderless_common::monotonic_after(state.last_timestamp);
        state.last_timestamp = Some(timestamp);

        let mut committed = Vec::with_capacity(batch.entries.len());
        for entry in batch.entries {
            state.last_id += 1;
            let record = Transaction {
                id: TransactionId::new(state.last_id),
                correlation_id: batch.correlation_id,
                wallet_id: entry.wallet_id,
                kind: entry.kind,
                currency: entry.money.currency,
                amount: entry.money.value,
                counterparty: entry.counterparty,
                timestamp,
            };
            let index = state.records.len();
            state.records.push(record.clone());
            state.by_wallet.entry(record.wallet_id).or_default().push(index);
            committed.push(record);
        }

        Ok(committed)
    }

    fn list_for(&self, wallet_id: &WalletId) -> Result<Vec<Transaction>> {
        let state = self.state.read();
        Ok(state
            .by_wallet
            .get(wallet_id)
            .map(|indices| indices.iter().map(|&i| state.records[i].clone()).collect())
            .unwrap_or_default())
    }

    fn list_all(&self) -> Result<Vec<Transaction>> {
        Ok(self.state.read().records.clone())
    }
}
