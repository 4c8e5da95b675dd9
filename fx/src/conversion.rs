//! Rates and currency conversion.

use borderless_common::{CurrencyPair, Money, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FxError, FxResult};

/// A quoted conversion rate for an ordered currency pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    /// The currency pair.
    pub pair: CurrencyPair,
    /// Units of `pair.quote` per unit of `pair.base`.
    pub rate: Decimal,
    /// Rate source.
    pub source: String,
    /// When this rate was quoted.
    pub quoted_at: Timestamp,
}

impl FxRate {
    /// Create a new rate; zero or negative rates are rejected.
    pub fn new(pair: CurrencyPair, rate: Decimal, source: impl Into<String>) -> FxResult<Self> {
        if rate <= Decimal::ZERO {
            return Err(FxError::InvalidRate { pair, rate });
        }
        Ok(Self {
            pair,
            rate,
            source: source.into(),
            quoted_at: borderless_common::now(),
        })
    }
}

/// A computed conversion: what is debited and what is credited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    /// Amount debited, in the base currency.
    pub input: Money,
    /// Amount credited, in the quote currency, rounded half-to-even.
    pub output: Money,
    /// Rate used.
    pub rate: FxRate,
}

impl Conversion {
    /// Convert `input` at `rate`.
    ///
    /// `input * rate` is rounded half-to-even to the quote currency's minor
    /// unit, so identical inputs always produce identical credits.
    pub fn execute(input: Money, rate: FxRate) -> FxResult<Self> {
        if input.currency != rate.pair.base {
            return Err(FxError::CurrencyMismatch {
                expected: rate.pair.base,
                actual: input.currency,
            });
        }
        if rate.rate <= Decimal::ZERO {
            return Err(FxError::InvalidRate {
                pair: rate.pair,
                rate: rate.rate,
            });
        }

        let converted = input
            .value
            .checked_mul(rate.rate)
            .ok_or(FxError::ConversionOverflow {
                pair: rate.pair,
                amount: input.value,
            })?;
        let output = Money::new(converted, rate.pair.quote).round();
        if output.value <= Decimal::ZERO {
            return Err(FxError::ConversionTooSmall {
                pair: rate.pair,
                amount: input.value,
            });
        }

        Ok(Self {
            input,
            output,
            rate,
        })
    }

    /// Get the effective rate after rounding.
    pub fn effective_rate(&self) -> Decimal {
        if self.input.value.is_zero() {
            return Decimal::ZERO;
        }
        self.output.value / self.input.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use borderless_common::Currency;
    use rust_decimal_macros::dec;

    fn usd_eur(rate: Decimal) -> FxRate {
        FxRate::new(CurrencyPair::new(Currency::Usdx, Currency::Eurx), rate, "TEST").unwrap()
    }

    #[test]
    fn test_conversion_rounds_to_minor_unit() {
        let conversion =
            Conversion::execute(Money::new(dec!(50), Currency::Usdx), usd_eur(dec!(0.9))).unwrap();
        assert_eq!(conversion.output, Money::new(dec!(45.0), Currency::Eurx));

        // 10.05 * 0.5 = 5.025 -> 5.02 under half-to-even
        let conversion =
            Conversion::execute(Money::new(dec!(10.05), Currency::Usdx), usd_eur(dec!(0.5))).unwrap();
        assert_eq!(conversion.output.value, dec!(5.02));
        assert_eq!(conversion.effective_rate(), dec!(5.02) / dec!(10.05));
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let a = Conversion::execute(Money::new(dec!(33.33), Currency::Usdx), usd_eur(dec!(0.84))).unwrap();
        let b = Conversion::execute(Money::new(dec!(33.33), Currency::Usdx), usd_eur(dec!(0.84))).unwrap();
        assert_eq!(a.output, b.output);
    }

    #[test]
    fn test_conversion_currency_mismatch() {
        let result = Conversion::execute(Money::new(dec!(10), Currency::Cngn), usd_eur(dec!(0.84)));
        assert!(matches!(result, Err(FxError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_conversion_too_small() {
        let pair = CurrencyPair::new(Currency::Cngn, Currency::Usdx);
        let rate = FxRate::new(pair, dec!(0.0006), "TEST").unwrap();
        let result = Conversion::execute(Money::new(dec!(1), Currency::Cngn), rate);
        assert!(matches!(result, Err(FxError::ConversionTooSmall { .. })));
    }

    #[test]
    fn test_non_positive_rate_rejected() {
        let pair = CurrencyPair::new(Currency::Usdx, Currency::Eurx);
        assert!(FxRate::new(pair, dec!(0), "TEST").is_err());
        assert!(FxRate::new(pair, dec!(-1), "TEST").is_err());
    }

    #[test]
    fn test_conversion_overflow_is_an_error() {
        let pair = CurrencyPair::new(Currency::Usdx, Currency::Cngn);
        let rate = FxRate::new(pair, dec!(1495), "TEST").unwrap();
        let result = Conversion::execute(Money::new(Decimal::MAX, Currency::Usdx), rate);
        assert!(matches!(result, Err(FxError::ConversionOverflow { .. })));
    }
}
