//! Borderless Simulator
//!
//! Drives a ledger engine with concurrent random operations and checks the
//! ledger's invariants afterwards.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use borderless_fx::StaticRateProvider;
use borderless_ledger::{LedgerConfig, LedgerEngine};

mod controller;
mod invariants;
mod metrics;

use controller::SimulationController;

/// Borderless ledger simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Concurrent load generator and invariant checker for the Borderless ledger")]
struct Args {
    /// Number of wallets to create
    #[arg(short, long, default_value = "8")]
    wallets: usize,

    /// Number of operations to run
    #[arg(short, long, default_value = "10000")]
    operations: usize,

    /// Operations in flight at once
    #[arg(short, long, default_value = "32")]
    concurrency: usize,

    /// Starting balance of every wallet in every currency
    #[arg(long, default_value = "1000")]
    initial_balance: u64,

    /// Wallet lock acquisition timeout in milliseconds
    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,borderless_ledger=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if args.wallets < 2 {
        anyhow::bail!("At least two wallets are needed for transfers");
    }

    let mut config = LedgerConfig::from_env();
    if let Some(ms) = args.lock_timeout_ms {
        config.lock.acquisition_timeout = Duration::from_millis(ms);
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    info!(
        wallets = args.wallets,
        operations = args.operations,
        concurrency = args.concurrency,
        seed = ?args.seed,
        "Starting Borderless simulator"
    );

    let engine = Arc::new(LedgerEngine::in_memory(
        config,
        Arc::new(StaticRateProvider::with_default_table()),
    ));

    let mut controller =
        SimulationController::new(engine.clone(), args.wallets, args.concurrency, args.seed);
    controller
        .initialize(Decimal::from(args.initial_balance))
        .await?;

    let calls = controller.plan(args.operations);
    let elapsed = controller.run(calls).await;

    // Print metrics
    let metrics = controller.get_metrics();
    info!("Simulation complete");
    info!("Total operations: {}", metrics.total_operations);
    info!("Committed: {:?}", metrics.committed);
    info!("Rejected: {:?}", metrics.rejected);
    info!("Success rate: {:.1}%", metrics.success_rate() * 100.0);
    info!("Throughput: {:.0} ops/s", metrics.throughput(elapsed));
    info!(
        "Latency avg/p50/p99: {}/{}/{} µs",
        metrics.average_latency_us(),
        metrics.p50_latency_us(),
        metrics.p99_latency_us()
    );
    info!("Engine metrics: {:?}", engine.metrics());

    let report = invariants::check(&engine, controller.wallets()).await?;
    if !report.is_clean() {
        for violation in &report.violations {
            error!(violation = %violation, "Invariant violated");
        }
        anyhow::bail!("{} invariant violations", report.violations.len());
    }

    info!(
        wallets = report.wallets_checked,
        records = report.records_checked,
        "All invariants hold"
    );
    Ok(())
}
