//! Post-run ledger invariant checks.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use borderless_common::{CorrelationId, Currency, WalletId};
use borderless_ledger::{LedgerEngine, Transaction, TransactionKind};

/// Violations found by [`check`].
#[derive(Debug, Default)]
pub struct InvariantReport {
    pub wallets_checked: usize,
    pub records_checked: usize,
    pub violations: Vec<String>,
}

impl InvariantReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    fn violation(&mut self, message: String) {
        self.violations.push(message);
    }
}

/// Check every wallet against the journal.
pub async fn check(engine: &LedgerEngine, wallets: &[WalletId]) -> anyhow::Result<InvariantReport> {
    let mut report = InvariantReport::default();
    let records = engine.list_transactions()?;
    report.records_checked = records.len();

    let mut balance_totals: BTreeMap<Currency, Decimal> = BTreeMap::new();
    for wallet in wallets {
        let view = engine.get_wallet(wallet).await?;
        report.wallets_checked += 1;

        let mut replayed: BTreeMap<Currency, Decimal> = BTreeMap::new();
        for record in &view.transactions {
            *replayed.entry(record.currency).or_default() += record.signed_amount();
        }
        replayed.retain(|_, v| !v.is_zero());

        if replayed != view.balances {
            report.violation(format!(
                "wallet {wallet}: balances {:?} do not match its records {:?}",
                view.balances, replayed
            ));
        }

        for (currency, balance) in &view.balances {
            if *balance <= Decimal::ZERO {
                report.violation(format!("wallet {wallet}: {currency} balance is {balance}"));
            }
            *balance_totals.entry(*currency).or_default() += *balance;
        }
    }

    let mut flow_totals: BTreeMap<Currency, Decimal> = BTreeMap::new();
    for record in &records {
        *flow_totals.entry(record.currency).or_default() += record.signed_amount();
    }
    flow_totals.retain(|_, v| !v.is_zero());
    balance_totals.retain(|_, v| !v.is_zero());
    if flow_totals != balance_totals {
        report.violation(format!(
            "currency totals {balance_totals:?} differ from net recorded flow {flow_totals:?}"
        ));
    }

    check_ordering(&records, &mut report);
    check_pairs(&records, &mut report);

    Ok(report)
}

fn check_ordering(records: &[Transaction], report: &mut InvariantReport) {
    for pair in records.windows(2) {
        if pair[0].id >= pair[1].id {
            report.violation(format!("record ids out of order: {} then {}", pair[0].id, pair[1].id));
        }
        if pair[0].timestamp > pair[1].timestamp {
            report.violation(format!("record {} timestamp goes backwards", pair[1].id));
        }
    }
}

/// Every swap and transfer has exactly its two matching records.
fn check_pairs(records: &[Transaction], report: &mut InvariantReport) {
    let mut groups: HashMap<CorrelationId, Vec<&Transaction>> = HashMap::new();
    for record in records {
        groups.entry(record.correlation_id).or_default().push(record);
    }

    let mut transfer_net: BTreeMap<Currency, Decimal> = BTreeMap::new();
    for (correlation_id, group) in &groups {
        match group.as_slice() {
            [single] if single.kind == TransactionKind::Deposit => {}
            [out, inn]
                if out.kind == TransactionKind::SwapOut
                    && inn.kind == TransactionKind::SwapIn
                    && out.wallet_id == inn.wallet_id
                    && out.currency != inn.currency => {}
            [out, inn]
                if out.kind == TransactionKind::TransferOut
                    && inn.kind == TransactionKind::TransferIn
                    && out.currency == inn.currency
                    && out.amount == inn.amount
                    && out.wallet_id != inn.wallet_id =>
            {
                *transfer_net.entry(out.currency).or_default() +=
                    out.signed_amount() + inn.signed_amount();
            }
            other => {
                let kinds: Vec<_> = other.iter().map(|r| r.kind).collect();
                report.violation(format!("operation {correlation_id} has records {kinds:?}"));
            }
        }
    }

    for (currency, net) in transfer_net {
        if !net.is_zero() {
            report.violation(format!("transfers created {net} {currency}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use borderless_fx::StaticRateProvider;
    use borderless_ledger::{DepositRequest, LedgerConfig, SwapRequest, TransferRequest};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_clean_ledger_passes() {
        let engine = LedgerEngine::in_memory(
            LedgerConfig::default(),
            Arc::new(StaticRateProvider::with_default_table()),
        );
        let a = engine.create_wallet();
        let b = engine.create_wallet();

        engine
            .deposit(DepositRequest::new(a, Currency::Usdx, dec!(100)))
            .await
            .unwrap();
        engine
            .swap(SwapRequest::new(a, Currency::Usdx, Currency::Cngn, dec!(10)))
            .await
            .unwrap();
        engine
            .transfer(TransferRequest::new(a, b, Currency::Cngn, dec!(500)))
            .await
            .unwrap();

        let report = check(&engine, &[a, b]).await.unwrap();
        assert!(report.is_clean(), "{:?}", report.violations);
        assert_eq!(report.wallets_checked, 2);
        assert_eq!(report.records_checked, 5);
    }
}
