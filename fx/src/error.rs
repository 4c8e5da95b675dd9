//! FX error types.

use borderless_common::{Currency, CurrencyPair};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while resolving or applying a rate.
#[derive(Debug, Clone, Error)]
pub enum FxError {
    /// Rate not available for the requested currency pair.
    #[error("Rate not available for {0}")]
    RateNotAvailable(CurrencyPair),

    /// Provider quoted a zero or negative rate.
    #[error("Invalid rate {rate} for {pair}")]
    InvalidRate { pair: CurrencyPair, rate: Decimal },

    /// Currency mismatch in conversion.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    /// Converted amount rounds to nothing in the target currency.
    #[error("Converting {amount} at {pair} yields less than one minor unit")]
    ConversionTooSmall { pair: CurrencyPair, amount: Decimal },

    /// `amount * rate` exceeds the representable range.
    #[error("Converting {amount} at {pair} overflows")]
    ConversionOverflow { pair: CurrencyPair, amount: Decimal },

    /// Provider returned an error.
    #[error("Rate provider error: {0}")]
    ProviderError(String),
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
