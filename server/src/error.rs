//! Mapping of ledger errors onto HTTP responses.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use borderless_common::{ErrorKind, LedgerError};

/// Error body: `{"detail": ..., "code": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub code: &'static str,
}

/// A ledger error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(error: LedgerError) -> Self {
        ApiError(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Validation | ErrorKind::InsufficientFunds | ErrorKind::RateUnavailable => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::StorageFault => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match &self.0 {
            LedgerError::WalletNotFound(_) => "Wallet not found".to_string(),
            LedgerError::Validation { message, .. } => format!("Invalid input. {message}"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && self.0.kind() == ErrorKind::StorageFault {
            error!(error = %self.0, "Storage fault while serving request");
        }

        let body = Json(ErrorBody {
            detail: self.detail(),
            code: self.0.error_code(),
        });

        match self.0.retry_after_ms() {
            Some(ms) => {
                // Retry-After is whole seconds.
                let secs = ms.div_ceil(1000).max(1);
                (status, [(header::RETRY_AFTER, secs.to_string())], body).into_response()
            }
            None => (status, body).into_response(),
        }
    }
}
