//! Error types for ledger operations.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Currency, WalletId};

/// Main error type for ledger operations.
///
/// Every failure except `StorageFault` is detected before any balance or
/// record is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Malformed amount, unsupported currency or self-transfer.
    #[error("Invalid input: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Unknown wallet id.
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// Balance too low for the requested debit.
    #[error("Insufficient funds in {wallet_id}: required {required} {currency}, available {available}")]
    InsufficientFunds {
        wallet_id: WalletId,
        currency: Currency,
        required: Decimal,
        available: Decimal,
    },

    /// No conversion rate for the pair.
    #[error("FX rate unavailable for {from}/{to}: {reason}")]
    RateUnavailable {
        from: Currency,
        to: Currency,
        reason: String,
    },

    /// A wallet lock or idempotency slot could not be acquired in time.
    #[error("Busy: {resource}, retry after {retry_after_ms}ms")]
    Busy {
        resource: String,
        retry_after_ms: u64,
    },

    /// Underlying persistence failure.
    #[error("Storage fault: {0}")]
    StorageFault(String),
}

/// Fieldless discriminant of [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientFunds,
    RateUnavailable,
    Busy,
    StorageFault,
}

impl LedgerError {
    /// Build a validation error tied to a request field.
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. } => ErrorKind::Validation,
            LedgerError::WalletNotFound(_) => ErrorKind::NotFound,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::RateUnavailable { .. } => ErrorKind::RateUnavailable,
            LedgerError::Busy { .. } => ErrorKind::Busy,
            LedgerError::StorageFault(_) => ErrorKind::StorageFault,
        }
    }

    /// Check if this error is retryable. Storage faults are fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Busy { .. })
    }

    /// Get suggested retry delay in milliseconds.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            LedgerError::Busy { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// Get a stable error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorKind::RateUnavailable => "RATE_UNAVAILABLE",
            ErrorKind::Busy => "BUSY",
            ErrorKind::StorageFault => "STORAGE_FAULT",
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
