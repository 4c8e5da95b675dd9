//! Borderless FX
//!
//! Exchange-rate lookup for wallet swaps.
//!
//! The ledger treats rate sourcing as a supplied collaborator: anything that
//! implements [`RateProvider`] can back it. [`StaticRateProvider`] carries a
//! fixed rate table and is what the service runs with out of the box.
//!
//! # Example
//!
//! ```rust,ignore
//! use borderless_fx::{Conversion, RateProvider, StaticRateProvider};
//! use borderless_common::{Currency, CurrencyPair, Money};
//!
//! let provider = StaticRateProvider::with_default_table();
//! let rate = provider.get_rate(&CurrencyPair::new(Currency::Usdx, Currency::Eurx)).await?;
//! let conversion = Conversion::execute(Money::new(dec!(50), Currency::Usdx), rate)?;
//! ```

pub mod provider;
pub mod conversion;
pub mod error;

pub use provider::{RateProvider, StaticRateProvider};
#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
pub use conversion::{Conversion, FxRate};
pub use error::{FxError, FxResult};
