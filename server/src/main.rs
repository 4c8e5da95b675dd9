//! Borderless ledger server binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use borderless_fx::StaticRateProvider;
use borderless_ledger::LedgerEngine;
use borderless_server::{LedgerServer, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Borderless ledger server");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let rates = Arc::new(StaticRateProvider::with_default_table());
    let engine = Arc::new(LedgerEngine::in_memory(config.ledger.clone(), rates));

    info!(
        lock_timeout_ms = config.ledger.lock.acquisition_timeout.as_millis() as u64,
        idempotency_window_secs = config.ledger.idempotency.window.as_secs(),
        "Ledger engine ready"
    );

    LedgerServer::new(config, engine)
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await
}
