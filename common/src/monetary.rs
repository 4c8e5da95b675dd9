//! Currencies and amounts.
//!
//! Balances are kept as sparse maps from [`Currency`] to [`Decimal`]; a
//! currency with no entry has a balance of zero. Amounts entering the ledger
//! are validated here before any wallet is touched.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// The closed set of currencies the ledger holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USDx")]
    Usdx,
    #[serde(rename = "EURx")]
    Eurx,
    #[serde(rename = "cNGN")]
    Cngn,
    #[serde(rename = "cXAF")]
    Cxaf,
}

impl Currency {
    /// Every supported currency.
    pub const ALL: [Currency; 4] = [Currency::Usdx, Currency::Eurx, Currency::Cngn, Currency::Cxaf];

    /// Get the ticker, exactly as it appears on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usdx => "USDx",
            Currency::Eurx => "EURx",
            Currency::Cngn => "cNGN",
            Currency::Cxaf => "cXAF",
        }
    }

    /// Minor-unit precision. cXAF tracks the franc, which has no subunit.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::Cxaf => 0,
            _ => 2,
        }
    }

    /// Round half-to-even to this currency's minor unit.
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.decimal_places(), RoundingStrategy::MidpointNearestEven)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    /// Tickers are case-sensitive.
    fn from_str(s: &str) -> Result<Self> {
        Currency::ALL
            .iter()
            .copied()
            .find(|c| c.code() == s)
            .ok_or_else(|| LedgerError::validation(format!("Unsupported currency: {s}"), "currency"))
    }
}

/// An ordered pair of currencies for rate lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Currency being sold.
    pub base: Currency,
    /// Currency being bought.
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote,
            quote: self.base,
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A monetary amount with currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub value: Decimal,
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Validate a caller-supplied amount: strictly positive and no finer than
    /// the currency's minor unit.
    pub fn positive(value: Decimal, currency: Currency) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::validation("Amount must be greater than zero", "amount"));
        }
        if value.normalize().scale() > currency.decimal_places() {
            return Err(LedgerError::validation(
                format!(
                    "Amount {value} has more than {} decimal places for {currency}",
                    currency.decimal_places()
                ),
                "amount",
            ));
        }
        Ok(Self { value, currency })
    }

    /// Round to the currency's minor unit (half-to-even).
    pub fn round(&self) -> Self {
        Self {
            value: self.currency.round(self.value),
            currency: self.currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// Sparse balance map. Absent currencies are zero.
pub type Balances = BTreeMap<Currency, Decimal>;

/// Parse a decimal amount from text. Accepts plain and scientific notation.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| LedgerError::validation("Amount must be a numeric value", "amount"))
}

/// Convert a binary float, rejecting NaN and infinities.
pub fn amount_from_f64(value: f64) -> Result<Decimal> {
    if !value.is_finite() {
        return Err(LedgerError::validation("Amount must be a finite number", "amount"));
    }
    // Display for f64 is the shortest round-tripping form and never scientific.
    parse_amount(&value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_codes_are_case_sensitive() {
        assert_eq!("USDx".parse::<Currency>().unwrap(), Currency::Usdx);
        assert_eq!("cXAF".parse::<Currency>().unwrap(), Currency::Cxaf);
        assert!("usdx".parse::<Currency>().is_err());
        assert!("USD".parse::<Currency>().is_err());
    }

    #[test]
    fn test_currency_serde_uses_tickers() {
        let json = serde_json::to_string(&Currency::Cngn).unwrap();
        assert_eq!(json, "\"cNGN\"");
        let parsed: Currency = serde_json::from_str("\"EURx\"").unwrap();
        assert_eq!(parsed, Currency::Eurx);
    }

    #[test]
    fn test_round_half_to_even() {
        assert_eq!(Currency::Usdx.round(dec!(0.125)), dec!(0.12));
        assert_eq!(Currency::Usdx.round(dec!(0.135)), dec!(0.14));
        assert_eq!(Currency::Cxaf.round(dec!(2.5)), dec!(2));
        assert_eq!(Currency::Cxaf.round(dec!(3.5)), dec!(4));
    }

    #[test]
    fn test_money_positive_validation() {
        assert!(Money::positive(dec!(100), Currency::Usdx).is_ok());
        assert!(Money::positive(dec!(10.50), Currency::Usdx).is_ok());
        assert!(Money::positive(dec!(0), Currency::Usdx).is_err());
        assert!(Money::positive(dec!(-5), Currency::Usdx).is_err());
        assert!(Money::positive(dec!(0.001), Currency::Usdx).is_err());
        assert!(Money::positive(dec!(1.5), Currency::Cxaf).is_err());
        assert!(Money::positive(dec!(15.000), Currency::Cxaf).is_ok());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("100").unwrap(), dec!(100));
        assert_eq!(parse_amount(" 12.50 ").unwrap(), dec!(12.50));
        assert_eq!(parse_amount("1e3").unwrap(), dec!(1000));
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn test_amount_from_f64() {
        assert_eq!(amount_from_f64(0.1).unwrap(), dec!(0.1));
        assert!(amount_from_f64(f64::NAN).is_err());
        assert!(amount_from_f64(f64::INFINITY).is_err());
        assert!(amount_from_f64(f64::NEG_INFINITY).is_err());
    }
}
