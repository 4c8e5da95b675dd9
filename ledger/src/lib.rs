//! Borderless Ledger Engine
//!
//! Multi-currency wallet ledger. Deposits, swaps and transfers are applied
//! atomically: every balance delta and every transaction record of an
//! operation is committed together or not at all, under per-wallet
//! serialization.

pub mod config;
pub mod engine;
pub mod idempotency;
pub mod journal;
pub mod lock_manager;
pub mod metrics;
pub mod store;
pub mod wallet;

pub use config::{IdempotencyConfig, LedgerConfig, LockConfig};
pub use engine::{DepositRequest, LedgerEngine, LedgerReceipt, SwapRequest, TransferRequest};
pub use journal::{
    Counterparty, InMemoryTransactionLog, JournalBatch, Transaction, TransactionKind,
    TransactionLog,
};
pub use metrics::{LedgerMetrics, MetricsSnapshot};
pub use store::WalletStore;
pub use wallet::{Wallet, WalletSnapshot, WalletView};
