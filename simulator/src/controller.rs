//! Simulation controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::{debug, info};

use borderless_common::{Currency, OperationKind, WalletId};
use borderless_ledger::{DepositRequest, LedgerEngine, SwapRequest, TransferRequest};

use crate::metrics::SimulationMetrics;

/// One generated operation.
#[derive(Debug, Clone)]
pub enum PlannedOp {
    Deposit {
        wallet: WalletId,
        currency: Currency,
        amount: Decimal,
    },
    Swap {
        wallet: WalletId,
        from: Currency,
        to: Currency,
        amount: Decimal,
    },
    Transfer {
        from: WalletId,
        to: WalletId,
        currency: Currency,
        amount: Decimal,
    },
}

impl PlannedOp {
    pub fn kind(&self) -> OperationKind {
        match self {
            PlannedOp::Deposit { .. } => OperationKind::Deposit,
            PlannedOp::Swap { .. } => OperationKind::Swap,
            PlannedOp::Transfer { .. } => OperationKind::Transfer,
        }
    }
}

/// A planned operation with an optional idempotency key.
#[derive(Debug, Clone)]
pub struct PlannedCall {
    pub op: PlannedOp,
    pub idempotency_key: Option<String>,
}

/// Controls the simulation.
pub struct SimulationController {
    engine: Arc<LedgerEngine>,
    wallet_count: usize,
    concurrency: usize,
    /// Share of calls that resend an earlier idempotency key.
    replay_ratio: f64,
    rng: StdRng,
    wallets: Vec<WalletId>,
    metrics: Arc<Mutex<SimulationMetrics>>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(
        engine: Arc<LedgerEngine>,
        wallet_count: usize,
        concurrency: usize,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            engine,
            wallet_count,
            concurrency: concurrency.max(1),
            replay_ratio: 0.05,
            rng,
            wallets: Vec::new(),
            metrics: Arc::new(Mutex::new(SimulationMetrics::new())),
        }
    }

    pub fn wallets(&self) -> &[WalletId] {
        &self.wallets
    }

    /// Create wallets and fund each with `initial_balance` of every currency.
    pub async fn initialize(&mut self, initial_balance: Decimal) -> anyhow::Result<()> {
        info!(wallets = self.wallet_count, "Initializing simulation");

        for _ in 0..self.wallet_count {
            let wallet = self.engine.create_wallet();
            for currency in Currency::ALL {
                self.engine
                    .deposit(DepositRequest::new(wallet, currency, initial_balance))
                    .await?;
            }
            debug!(wallet_id = %wallet, balance = %initial_balance, "Wallet funded");
            self.wallets.push(wallet);
        }

        Ok(())
    }

    /// Generate `count` operations. The plan depends only on the seed.
    pub fn plan(&mut self, count: usize) -> Vec<PlannedCall> {
        let mut calls: Vec<PlannedCall> = Vec::with_capacity(count);

        for i in 0..count {
            if !calls.is_empty() && self.rng.gen_bool(self.replay_ratio) {
                let previous = calls[self.rng.gen_range(0..calls.len())].clone();
                if previous.idempotency_key.is_some() {
                    calls.push(previous);
                    continue;
                }
            }

            let op = self.random_op();
            let idempotency_key = self.rng.gen_bool(0.2).then(|| format!("sim-{i}"));
            calls.push(PlannedCall { op, idempotency_key });
        }

        calls
    }

    fn random_op(&mut self) -> PlannedOp {
        let wallet = self.random_wallet();
        match self.rng.gen_range(0..10) {
            0..=2 => {
                let currency = self.random_currency();
                PlannedOp::Deposit {
                    wallet,
                    currency,
                    amount: self.random_amount(currency),
                }
            }
            3..=5 => {
                let from = self.random_currency();
                let mut to = self.random_currency();
                while to == from {
                    to = self.random_currency();
                }
                PlannedOp::Swap {
                    wallet,
                    from,
                    to,
                    amount: self.random_amount(from),
                }
            }
            _ => {
                let mut to = self.random_wallet();
                while to == wallet && self.wallets.len() > 1 {
                    to = self.random_wallet();
                }
                let currency = self.random_currency();
                PlannedOp::Transfer {
                    from: wallet,
                    to,
                    currency,
                    amount: self.random_amount(currency),
                }
            }
        }
    }

    fn random_wallet(&mut self) -> WalletId {
        self.wallets[self.rng.gen_range(0..self.wallets.len())]
    }

    fn random_currency(&mut self) -> Currency {
        Currency::ALL[self.rng.gen_range(0..Currency::ALL.len())]
    }

    /// Between one minor unit and 500 whole units.
    fn random_amount(&mut self, currency: Currency) -> Decimal {
        let places = currency.decimal_places();
        let max_units = 500 * 10i64.pow(places);
        Decimal::new(self.rng.gen_range(1..=max_units), places)
    }

    /// Run `calls` against the engine, `concurrency` at a time.
    pub async fn run(&self, calls: Vec<PlannedCall>) -> Duration {
        info!(
            operations = calls.len(),
            concurrency = self.concurrency,
            "Running simulation"
        );
        let started = Instant::now();

        stream::iter(calls)
            .for_each_concurrent(self.concurrency, |call| {
                let engine = self.engine.clone();
                let metrics = self.metrics.clone();
                async move {
                    let handle = tokio::spawn(async move {
                        let kind = call.op.kind();
                        let started = Instant::now();
                        let result = execute(&engine, call).await;
                        (kind, result, started.elapsed())
                    });
                    match handle.await {
                        Ok((kind, Ok(()), latency)) => metrics.lock().record_success(kind, latency),
                        Ok((_, Err(code), latency)) => metrics.lock().record_failure(code, latency),
                        Err(e) => {
                            debug!(error = %e, "Simulation task failed");
                            metrics.lock().record_failure("TASK_PANICKED", Duration::ZERO);
                        }
                    }
                }
            })
            .await;

        started.elapsed()
    }

    /// Get simulation metrics.
    pub fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.lock().clone()
    }
}

async fn execute(engine: &LedgerEngine, call: PlannedCall) -> Result<(), &'static str> {
    let key = call.idempotency_key;
    let result = match call.op {
        PlannedOp::Deposit {
            wallet,
            currency,
            amount,
        } => {
            let mut request = DepositRequest::new(wallet, currency, amount);
            request.idempotency_key = key;
            engine.deposit(request).await
        }
        PlannedOp::Swap {
            wallet,
            from,
            to,
            amount,
        } => {
            let mut request = SwapRequest::new(wallet, from, to, amount);
            request.idempotency_key = key;
            engine.swap(request).await
        }
        PlannedOp::Transfer {
            from,
            to,
            currency,
            amount,
        } => {
            let mut request = TransferRequest::new(from, to, currency, amount);
            request.idempotency_key = key;
            engine.transfer(request).await
        }
    };
    result.map(|_| ()).map_err(|e| e.error_code())
}
