//! Rate provider trait and implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use borderless_common::{Currency, CurrencyPair};
use rust_decimal::Decimal;
use tracing::debug;

use crate::conversion::FxRate;
use crate::error::{FxError, FxResult};

/// Source of conversion rates.
///
/// The ledger calls this without holding any wallet lock, so implementations
/// are free to be slow or remote.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the rate for converting `pair.base` into `pair.quote`.
    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<FxRate>;

    /// Check if this provider quotes the given pair.
    fn supports_pair(&self, pair: &CurrencyPair) -> bool;

    /// Get all quoted pairs.
    fn supported_pairs(&self) -> Vec<CurrencyPair>;
}

/// Fixed rate table.
#[derive(Debug, Clone, Default)]
pub struct StaticRateProvider {
    rates: HashMap<CurrencyPair, Decimal>,
}

impl StaticRateProvider {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The service's built-in table. Each quoted pair also gets its exact
    /// decimal reciprocal; nothing is quoted for cXAF.
    pub fn with_default_table() -> Self {
        let mut provider = Self::new();
        let table = [
            (Currency::Usdx, Currency::Cngn, Decimal::from(1495)),
            (Currency::Usdx, Currency::Eurx, Decimal::new(84, 2)),
            (Currency::Eurx, Currency::Cngn, Decimal::new(17791, 1)),
        ];
        for (base, quote, rate) in table {
            provider
                .rates
                .insert(CurrencyPair::new(base, quote), rate);
            provider
                .rates
                .insert(CurrencyPair::new(quote, base), Decimal::ONE / rate);
        }
        provider
    }

    /// Quote a single direction. Zero or negative rates are rejected.
    pub fn set_rate(&mut self, pair: CurrencyPair, rate: Decimal) -> FxResult<()> {
        if rate <= Decimal::ZERO {
            return Err(FxError::InvalidRate { pair, rate });
        }
        self.rates.insert(pair, rate);
        Ok(())
    }
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    fn name(&self) -> &str {
        "STATIC"
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<FxRate> {
        let rate = self
            .rates
            .get(pair)
            .copied()
            .ok_or(FxError::RateNotAvailable(*pair))?;
        debug!(pair = %pair, rate = %rate, "Resolved static rate");
        FxRate::new(*pair, rate, self.name())
    }

    fn supports_pair(&self, pair: &CurrencyPair) -> bool {
        self.rates.contains_key(pair)
    }

    fn supported_pairs(&self) -> Vec<CurrencyPair> {
        let mut pairs: Vec<CurrencyPair> = self.rates.keys().copied().collect();
        pairs.sort_by_key(|p| (p.base, p.quote));
        pairs
    }
}

/// Scriptable provider for tests: rates can be changed while shared, calls
/// are counted, and a failure or delay can be injected.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    rates: dashmap::DashMap<CurrencyPair, Decimal>,
    failure: parking_lot::Mutex<Option<String>>,
    delay: parking_lot::Mutex<Option<std::time::Duration>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a new mock provider with no rates.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: dashmap::DashMap::new(),
            failure: parking_lot::Mutex::new(None),
            delay: parking_lot::Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set a rate for a currency pair.
    pub fn set_rate(&self, base: Currency, quote: Currency, rate: Decimal) {
        self.rates.insert(CurrencyPair::new(base, quote), rate);
    }

    /// Make every lookup fail with a provider error.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Delay every lookup.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<FxRate> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failure.lock().clone() {
            return Err(FxError::ProviderError(message));
        }

        let rate = self
            .rates
            .get(pair)
            .map(|r| *r)
            .ok_or(FxError::RateNotAvailable(*pair))?;
        FxRate::new(*pair, rate, self.name.clone())
    }

    fn supports_pair(&self, pair: &CurrencyPair) -> bool {
        self.rates.contains_key(pair)
    }

    fn supported_pairs(&self) -> Vec<CurrencyPair> {
        self.rates.iter().map(|r| *r.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_default_table_quotes_known_pairs() {
        let provider = StaticRateProvider::with_default_table();

        let rate = provider
            .get_rate(&CurrencyPair::new(Currency::Usdx, Currency::Cngn))
            .await
            .unwrap();
        assert_eq!(rate.rate, dec!(1495));
        assert_eq!(rate.source, "STATIC");

        let rate = provider
            .get_rate(&CurrencyPair::new(Currency::Eurx, Currency::Usdx))
            .await
            .unwrap();
        assert_eq!(rate.rate, Decimal::ONE / dec!(0.84));

        assert_eq!(provider.supported_pairs().len(), 6);
    }

    #[tokio::test]
    async fn test_default_table_has_no_cxaf() {
        let provider = StaticRateProvider::with_default_table();

        for currency in [Currency::Usdx, Currency::Eurx, Currency::Cngn] {
            let pair = CurrencyPair::new(currency, Currency::Cxaf);
            assert!(!provider.supports_pair(&pair));
            assert!(matches!(
                provider.get_rate(&pair).await,
                Err(FxError::RateNotAvailable(_))
            ));
            assert!(!provider.supports_pair(&pair.inverse()));
        }
    }

    #[test]
    fn test_static_rejects_non_positive_rate() {
        let mut provider = StaticRateProvider::new();
        let pair = CurrencyPair::new(Currency::Usdx, Currency::Eurx);
        assert!(provider.set_rate(pair, dec!(0)).is_err());
        assert!(provider.set_rate(pair, dec!(0.9)).is_ok());
        assert!(provider.supports_pair(&pair));

        let rate = tokio_test::block_on(provider.get_rate(&pair)).unwrap();
        assert_eq!(rate.rate, dec!(0.9));
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockRateProvider::new("test");
        provider.set_rate(Currency::Usdx, Currency::Eurx, dec!(0.9));

        let pair = CurrencyPair::new(Currency::Usdx, Currency::Eurx);
        let result = provider.get_rate(&pair).await.unwrap();
        assert_eq!(result.rate, dec!(0.9));
        assert_eq!(provider.calls(), 1);

        provider.fail_with("upstream down");
        assert!(matches!(
            provider.get_rate(&pair).await,
            Err(FxError::ProviderError(_))
        ));
        assert_eq!(provider.calls(), 2);
    }
}
