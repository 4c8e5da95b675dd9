//! Shared server state.

use std::sync::Arc;

use parking_lot::RwLock;

use borderless_ledger::LedgerEngine;

/// Server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Serving requests.
    Running,
    /// Draining; new requests should go elsewhere.
    ShuttingDown,
}

impl ServerStatus {
    /// Check if the server is accepting new requests.
    pub fn accepts_requests(&self) -> bool {
        matches!(self, ServerStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Running => "ok",
            ServerStatus::ShuttingDown => "shutting_down",
        }
    }
}

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LedgerEngine>,
    status: Arc<RwLock<ServerStatus>>,
}

impl AppState {
    pub fn new(engine: Arc<LedgerEngine>) -> Self {
        Self {
            engine,
            status: Arc::new(RwLock::new(ServerStatus::Running)),
        }
    }

    pub fn status(&self) -> ServerStatus {
        *self.status.read()
    }

    pub fn set_status(&self, status: ServerStatus) {
        *self.status.write() = status;
    }
}
