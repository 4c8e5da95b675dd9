//! Request handlers.
//!
//! Bodies are parsed loosely (currencies and ids as strings, amounts as any
//! JSON value) so that malformed input is reported as a ledger validation
//! error instead of a framework rejection.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use borderless_common::{parse_amount, Balances, CorrelationId, Currency, LedgerError, WalletId};
use borderless_ledger::{
    DepositRequest, LedgerReceipt, MetricsSnapshot, SwapRequest, Transaction, TransferRequest,
    WalletSnapshot, WalletView,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the caller's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct DepositBody {
    pub wallet_id: String,
    pub currency: String,
    pub amount: Value,
}

#[derive(Debug, Deserialize)]
pub struct SwapBody {
    pub wallet_id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub amount: Value,
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub from_wallet: String,
    pub to_wallet: String,
    pub currency: String,
    pub amount: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletCreated {
    pub wallet_id: WalletId,
}

/// Wallet state after a committed operation.
#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub wallet_id: WalletId,
    pub balances: Balances,
    pub correlation_id: CorrelationId,
    pub records: Vec<Transaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<WalletSnapshot>,
}

impl From<LedgerReceipt> for OperationResponse {
    fn from(receipt: LedgerReceipt) -> Self {
        Self {
            wallet_id: receipt.wallet.wallet_id,
            balances: receipt.wallet.balances,
            correlation_id: receipt.correlation_id,
            records: receipt.records,
            counterparty: receipt.counterparty,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub wallets: usize,
    pub metrics: MetricsSnapshot,
}

/// `POST /wallets`
pub async fn create_wallet(State(state): State<AppState>) -> Json<WalletCreated> {
    Json(WalletCreated {
        wallet_id: state.engine.create_wallet(),
    })
}

/// `GET /wallets/:id`
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<Json<WalletView>> {
    let wallet_id = wallet_id_from(&wallet_id)?;
    Ok(Json(state.engine.get_wallet(&wallet_id).await?))
}

/// `POST /deposit`
pub async fn deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<DepositBody>, JsonRejection>,
) -> ApiResult<Json<OperationResponse>> {
    let Json(body) = body.map_err(rejected)?;
    let mut request = DepositRequest::new(
        wallet_id_from(&body.wallet_id)?,
        currency_from(&body.currency)?,
        amount_from(&body.amount)?,
    );
    request.idempotency_key = idempotency_key(&headers);

    let receipt = state.engine.deposit(request).await?;
    Ok(Json(receipt.into()))
}

/// `POST /swap`
pub async fn swap(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SwapBody>, JsonRejection>,
) -> ApiResult<Json<OperationResponse>> {
    let Json(body) = body.map_err(rejected)?;
    let mut request = SwapRequest::new(
        wallet_id_from(&body.wallet_id)?,
        currency_from(&body.from_currency)?,
        currency_from(&body.to_currency)?,
        amount_from(&body.amount)?,
    );
    request.idempotency_key = idempotency_key(&headers);

    let receipt = state.engine.swap(request).await?;
    Ok(Json(receipt.into()))
}

/// `POST /transfer`
pub async fn transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TransferBody>, JsonRejection>,
) -> ApiResult<Json<OperationResponse>> {
    let Json(body) = body.map_err(rejected)?;
    let mut request = TransferRequest::new(
        wallet_id_from(&body.from_wallet)?,
        wallet_id_from(&body.to_wallet)?,
        currency_from(&body.currency)?,
        amount_from(&body.amount)?,
    );
    request.idempotency_key = idempotency_key(&headers);

    let receipt = state.engine.transfer(request).await?;
    Ok(Json(receipt.into()))
}

/// `GET /transactions`
pub async fn list_transactions(State(state): State<AppState>) -> ApiResult<Json<Vec<Transaction>>> {
    Ok(Json(state.engine.list_transactions()?))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.status();
    let code = if status.accepts_requests() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status: status.as_str(),
            wallets: state.engine.wallet_count(),
            metrics: state.engine.metrics(),
        }),
    )
}

// --- Input parsing ---

fn rejected(rejection: JsonRejection) -> ApiError {
    LedgerError::validation(rejection.body_text(), "body").into()
}

/// Ids that are not UUIDs cannot name a wallet.
fn wallet_id_from(raw: &str) -> Result<WalletId, LedgerError> {
    WalletId::parse(raw.trim()).map_err(|_| LedgerError::WalletNotFound(raw.to_string()))
}

fn currency_from(raw: &str) -> Result<Currency, LedgerError> {
    raw.parse()
}

fn amount_from(raw: &Value) -> Result<Decimal, LedgerError> {
    match raw {
        Value::Number(n) => parse_amount(&n.to_string()),
        Value::String(s) => parse_amount(s),
        _ => Err(LedgerError::validation(
            "Amount must be a numeric value",
            "amount",
        )),
    }
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_amount_accepts_numbers_and_numeric_strings() {
        assert_eq!(amount_from(&json!(100)).unwrap(), dec!(100));
        assert_eq!(amount_from(&json!(12.5)).unwrap(), dec!(12.5));
        assert_eq!(amount_from(&json!("7.25")).unwrap(), dec!(7.25));
        assert_eq!(amount_from(&json!("1e2")).unwrap(), dec!(100));
    }

    #[test]
    fn test_amount_rejects_non_numeric() {
        for raw in [json!("abc"), json!("NaN"), json!("inf"), json!(null), json!(true), json!([1])] {
            let err = amount_from(&raw).unwrap_err();
            assert_eq!(err.error_code(), "VALIDATION_ERROR", "{raw}");
        }
    }

    #[test]
    fn test_malformed_wallet_id_is_not_found() {
        let err = wallet_id_from("not-a-uuid").unwrap_err();
        assert!(matches!(err, LedgerError::WalletNotFound(_)));
    }

    #[test]
    fn test_idempotency_key_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, " abc ".parse().unwrap());
        assert_eq!(idempotency_key(&headers), Some("abc".to_string()));

        headers.insert(IDEMPOTENCY_KEY_HEADER, "".parse().unwrap());
        assert_eq!(idempotency_key(&headers), None);
    }
}
