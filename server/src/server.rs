//! Router assembly and the serving loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use borderless_ledger::LedgerEngine;

use crate::config::ServerConfig;
use crate::handlers::{self, IDEMPOTENCY_KEY_HEADER};
use crate::state::{AppState, ServerStatus};

/// How often expired idempotency results are dropped.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the HTTP router over `state`.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/wallets", post(handlers::create_wallet))
        .route("/wallets/:wallet_id", get(handlers::get_wallet))
        .route("/deposit", post(handlers::deposit))
        .route("/swap", post(handlers::swap))
        .route("/transfer", post(handlers::transfer))
        .route("/transactions", get(handlers::list_transactions))
        .route("/health", get(handlers::health))
        .layer(cors(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static(IDEMPOTENCY_KEY_HEADER),
        ])
        .allow_credentials(true)
}

/// The ledger HTTP server.
pub struct LedgerServer {
    config: ServerConfig,
    state: AppState,
}

impl LedgerServer {
    pub fn new(config: ServerConfig, engine: Arc<LedgerEngine>) -> Self {
        Self {
            config,
            state: AppState::new(engine),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        let cleanup = {
            let engine = self.state.engine.clone();
            tokio::spawn(async move { engine.run_cleanup_loop(CLEANUP_INTERVAL).await })
        };

        let app = router(self.state.clone(), &self.config.allowed_origins);
        let state = self.state.clone();

        info!(listen_addr = %addr, "Ledger server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                state.set_status(ServerStatus::ShuttingDown);
                info!("Shutdown signal received, draining requests");
            })
            .await
            .context("Server error")?;

        cleanup.abort();
        info!("Ledger server stopped");
        Ok(())
    }
}
