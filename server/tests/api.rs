//! HTTP tests driving the router in-process.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use borderless_common::{Currency, CurrencyPair};
use borderless_fx::StaticRateProvider;
use borderless_ledger::{LedgerConfig, LedgerEngine};
use borderless_server::{router, AppState, ServerStatus};

fn app() -> (Router, AppState) {
    let mut rates = StaticRateProvider::new();
    rates
        .set_rate(CurrencyPair::new(Currency::Usdx, Currency::Eurx), dec!(0.9))
        .unwrap();
    let engine = Arc::new(LedgerEngine::in_memory(LedgerConfig::default(), Arc::new(rates)));
    let state = AppState::new(engine);
    let origins = vec!["http://localhost:3000".to_string()];
    (router(state.clone(), &origins), state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn create_wallet(app: &Router) -> String {
    let (status, body) = send(app, Request::post("/wallets").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    body["wallet_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_full_walkthrough_over_http() {
    let (app, _) = app();

    let w1 = create_wallet(&app).await;
    let (status, body) = send(
        &app,
        post("/deposit", json!({"wallet_id": w1, "currency": "USDx", "amount": 100})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balances"], json!({"USDx": "100"}));

    let (status, body) = send(
        &app,
        post(
            "/swap",
            json!({"wallet_id": w1, "from_currency": "USDx", "to_currency": "EURx", "amount": 50}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balances"]["USDx"], "50");
    assert_eq!(decimal(&body["balances"]["EURx"]), dec!(45));
    assert_eq!(body["records"].as_array().unwrap().len(), 2);

    let w2 = create_wallet(&app).await;
    let (status, body) = send(
        &app,
        post(
            "/transfer",
            json!({"from_wallet": w1, "to_wallet": w2, "currency": "USDx", "amount": "20"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balances"]["USDx"], "30");
    assert_eq!(body["counterparty"]["wallet_id"], w2.as_str());
    assert_eq!(body["counterparty"]["balances"]["USDx"], "20");

    let (status, body) = send(&app, get(&format!("/wallets/{w1}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 4);
    assert_eq!(body["transactions"][1]["kind"], "swap_out");
    assert_eq!(body["transactions"][1]["counterparty"], json!({"currency": "EURx"}));

    let (status, body) = send(&app, get("/transactions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_rejects_bad_amounts_with_400() {
    let (app, _) = app();
    let wallet = create_wallet(&app).await;

    for amount in [json!(-5), json!(0), json!("abc"), json!(null), json!("1.001")] {
        let (status, body) = send(
            &app,
            post("/deposit", json!({"wallet_id": wallet, "currency": "USDx", "amount": amount})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "amount {amount}");
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    let (_, body) = send(
        &app,
        post("/deposit", json!({"wallet_id": wallet, "currency": "USDx", "amount": "abc"})),
    )
    .await;
    assert_eq!(body["detail"], "Invalid input. Amount must be a numeric value");

    let (_, body) = send(&app, get(&format!("/wallets/{wallet}"))).await;
    assert_eq!(body["balances"], json!({}));
    assert_eq!(body["transactions"], json!([]));
}

#[tokio::test]
async fn test_rejects_unknown_currency_and_malformed_body() {
    let (app, _) = app();
    let wallet = create_wallet(&app).await;

    let (status, body) = send(
        &app,
        post("/deposit", json!({"wallet_id": wallet, "currency": "usdx", "amount": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, post("/deposit", json!({"wallet_id": wallet}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_wallets_are_404() {
    let (app, _) = app();

    let (status, body) = send(&app, get("/wallets/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Wallet not found");

    let (status, _) = send(
        &app,
        get("/wallets/00000000-0000-4000-8000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        post(
            "/deposit",
            json!({"wallet_id": "00000000-0000-4000-8000-000000000000", "currency": "USDx", "amount": 1}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_business_failures_are_400_with_codes() {
    let (app, _) = app();
    let w1 = create_wallet(&app).await;
    let w2 = create_wallet(&app).await;

    let (status, body) = send(
        &app,
        post(
            "/transfer",
            json!({"from_wallet": w1, "to_wallet": w2, "currency": "EURx", "amount": 1000}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INSUFFICIENT_FUNDS");

    let (status, body) = send(
        &app,
        post(
            "/swap",
            json!({"wallet_id": w1, "from_currency": "cNGN", "to_currency": "cXAF", "amount": 10}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "RATE_UNAVAILABLE");

    let (status, body) = send(
        &app,
        post(
            "/transfer",
            json!({"from_wallet": w1, "to_wallet": w1, "currency": "USDx", "amount": 1}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_idempotency_key_header_dedupes() {
    let (app, _) = app();
    let wallet = create_wallet(&app).await;

    let request = || {
        Request::post("/deposit")
            .header(header::CONTENT_TYPE, "application/json")
            .header("Idempotency-Key", "abc-123")
            .body(Body::from(
                json!({"wallet_id": wallet, "currency": "cXAF", "amount": 500}).to_string(),
            ))
            .unwrap()
    };

    let (first_status, first) = send(&app, request()).await;
    let (second_status, second) = send(&app, request()).await;
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first, second);

    let (_, body) = send(&app, get(&format!("/wallets/{wallet}"))).await;
    assert_eq!(body["balances"], json!({"cXAF": "500"}));
}

#[tokio::test]
async fn test_health_reports_metrics_and_status() {
    let (app, state) = app();
    let wallet = create_wallet(&app).await;
    send(
        &app,
        post("/deposit", json!({"wallet_id": wallet, "currency": "USDx", "amount": 1})),
    )
    .await;

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["wallets"], 1);
    assert_eq!(body["metrics"]["deposits"], 1);

    state.set_status(ServerStatus::ShuttingDown);
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "shutting_down");
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let (app, _) = app();

    let response = app
        .clone()
        .oneshot(
            Request::get("/transactions")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );

    let response = app
        .oneshot(
            Request::get("/transactions")
                .header(header::ORIGIN, "http://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
