//! Wallet state.
//!
//! Balances are a sparse map: a currency without an entry holds zero, and a
//! balance that reaches zero is removed, so two wallets with equal holdings
//! always compare equal regardless of history.

use borderless_common::{Balances, Currency, LedgerError, Result, Timestamp, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::journal::Transaction;

/// A wallet and its balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet identifier.
    pub id: WalletId,
    /// Non-negative balance per currency.
    balances: Balances,
    /// When the wallet was created.
    pub created_at: Timestamp,
    /// When a balance last changed.
    pub updated_at: Timestamp,
}

impl Wallet {
    /// Create an empty wallet.
    pub fn new(id: WalletId) -> Self {
        let now = borderless_common::now();
        Self {
            id,
            balances: Balances::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Balance in `currency`; zero when absent.
    pub fn balance(&self, currency: Currency) -> Decimal {
        self.balances.get(&currency).copied().unwrap_or(Decimal::ZERO)
    }

    /// All non-zero balances.
    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    /// Compute the balances that would result from `deltas` without
    /// applying them. Fails if any balance would go negative or overflow.
    pub fn preview(&self, deltas: &[(Currency, Decimal)]) -> Result<Balances> {
        let mut staged = self.balances.clone();
        for &(currency, delta) in deltas {
            let available = staged.get(&currency).copied().unwrap_or(Decimal::ZERO);
            let next = available.checked_add(delta).ok_or_else(|| {
                LedgerError::validation(
                    format!("Amount overflows the {currency} balance"),
                    "amount",
                )
            })?;
            if next < Decimal::ZERO {
                return Err(LedgerError::InsufficientFunds {
                    wallet_id: self.id,
                    currency,
                    required: -delta,
                    available,
                });
            }
            if next.is_zero() {
                staged.remove(&currency);
            } else {
                staged.insert(currency, next);
            }
        }
        Ok(staged)
    }

    /// Install balances produced by [`Wallet::preview`].
    pub fn commit(&mut self, staged: Balances) {
        self.balances = staged;
        self.updated_at = borderless_common::now();
    }

    /// Add a signed delta to one balance. Returns the new balance.
    pub fn apply_delta(&mut self, currency: Currency, delta: Decimal) -> Result<Decimal> {
        let staged = self.preview(&[(currency, delta)])?;
        self.commit(staged);
        Ok(self.balance(currency))
    }

    /// Check if the wallet can cover a debit.
    pub fn has_sufficient_funds(&self, currency: Currency, amount: Decimal) -> bool {
        self.balance(currency) >= amount
    }

    /// Balances at this moment.
    pub fn snapshot(&self) -> WalletSnapshot {
        WalletSnapshot {
            wallet_id: self.id,
            balances: self.balances.clone(),
        }
    }
}

/// Wallet balances at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub wallet_id: WalletId,
    pub balances: Balances,
}

/// Balances plus the wallet's own history, read together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletView {
    pub wallet_id: WalletId,
    pub balances: Balances,
    pub transactions: Vec<Transaction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_missing_currency_is_zero() {
        let wallet = Wallet::new(WalletId::new());
        assert_eq!(wallet.balance(Currency::Cxaf), Decimal::ZERO);
        assert!(wallet.balances().is_empty());
    }

    #[test]
    fn test_apply_delta() {
        let mut wallet = Wallet::new(WalletId::new());
        assert_eq!(wallet.apply_delta(Currency::Usdx, dec!(100)).unwrap(), dec!(100));
        assert_eq!(wallet.apply_delta(Currency::Usdx, dec!(-30)).unwrap(), dec!(70));
        assert!(wallet.has_sufficient_funds(Currency::Usdx, dec!(70)));
        assert!(!wallet.has_sufficient_funds(Currency::Usdx, dec!(70.01)));
    }

    #[test]
    fn test_negative_result_rejected_without_mutation() {
        let mut wallet = Wallet::new(WalletId::new());
        wallet.apply_delta(Currency::Eurx, dec!(45)).unwrap();

        let err = wallet.apply_delta(Currency::Eurx, dec!(-1000)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds { required, available, .. }
                if required == dec!(1000) && available == dec!(45)
        ));
        assert_eq!(wallet.balance(Currency::Eurx), dec!(45));
    }

    #[test]
    fn test_zero_balance_is_removed() {
        let mut wallet = Wallet::new(WalletId::new());
        wallet.apply_delta(Currency::Usdx, dec!(20)).unwrap();
        wallet.apply_delta(Currency::Usdx, dec!(-20)).unwrap();
        assert!(wallet.balances().is_empty());
        assert_eq!(wallet.snapshot(), Wallet::new(wallet.id).snapshot());
    }

    #[test]
    fn test_preview_is_all_or_nothing() {
        let mut wallet = Wallet::new(WalletId::new());
        wallet.apply_delta(Currency::Usdx, dec!(10)).unwrap();

        let result = wallet.preview(&[(Currency::Eurx, dec!(5)), (Currency::Usdx, dec!(-11))]);
        assert!(result.is_err());
        assert_eq!(wallet.balance(Currency::Eurx), Decimal::ZERO);

        let staged = wallet
            .preview(&[(Currency::Usdx, dec!(-10)), (Currency::Eurx, dec!(9))])
            .unwrap();
        wallet.commit(staged);
        assert_eq!(wallet.balance(Currency::Usdx), Decimal::ZERO);
        assert_eq!(wallet.balance(Currency::Eurx), dec!(9));
    }

    #[test]
    fn test_overflowing_credit_rejected_without_mutation() {
        let mut wallet = Wallet::new(WalletId::new());
        wallet.apply_delta(Currency::Usdx, Decimal::MAX).unwrap();

        let err = wallet.preview(&[(Currency::Usdx, dec!(1))]).unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
        assert!(wallet.apply_delta(Currency::Usdx, dec!(1)).is_err());
        assert_eq!(wallet.balance(Currency::Usdx), Decimal::MAX);
    }
}
