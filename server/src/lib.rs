//! Borderless Server
//!
//! Thin HTTP surface over the wallet ledger. Each endpoint parses its input,
//! calls one engine operation and maps the outcome to a response.

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{router, LedgerServer};
pub use state::{AppState, ServerStatus};
