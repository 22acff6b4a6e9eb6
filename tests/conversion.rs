use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use httpmock::prelude::*;
use often_gateway::auth::AuthService;
use often_gateway::{
    AppState, EnvSecretStore, Gateway, LedgerStore, PricingTable, ProviderRegistry, RateOracle,
    SecretCache,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;

const ADMIN_KEY: &str = "test-admin-key";

struct TestApp {
    _dir: tempfile::TempDir,
    app: axum::Router,
}

async fn test_app(oracle_base_url: &str) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LedgerStore::new(dir.path().join("ledger.sqlite"));
    store.init().await.expect("init");

    let gateway = Gateway::new(
        store.clone(),
        ProviderRegistry::builtin(),
        PricingTable::builtin(),
        SecretCache::new(Arc::new(EnvSecretStore)),
        RateOracle::new(oracle_base_url),
        ADMIN_KEY,
    );
    let auth = AuthService::new("test-jwt-secret");
    let app = often_gateway::router(AppState::new(gateway, auth, store));
    TestApp { _dir: dir, app }
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("send");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn signup(app: &axum::Router, email: &str) -> (String, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/signup")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "email": email, "password": "hunter2hunter2" }).to_string(),
        ))
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["uid"].as_str().unwrap().to_string(),
        body["idToken"].as_str().unwrap().to_string(),
    )
}

async fn deposit(app: &axum::Router, uid: &str, amount: i64, currency: &str) {
    let request = Request::builder()
        .method("POST")
        .uri("/deposit")
        .header("content-type", "application/json")
        .header("x-admin-key", ADMIN_KEY)
        .body(Body::from(
            json!({ "accountId": uid, "amount": amount, "currency": currency }).to_string(),
        ))
        .unwrap();
    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
}

fn convert_request(token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/convert")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn mount_oracle(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/v1/prices");
        then.status(200).json_body(json!({
            "USDC": 1.0,
            "ETH": 3000.0,
            "BTC": 97000.0,
            "SOL": 150.0,
        }));
    })
}

#[tokio::test]
async fn usd_to_eth_conversion_round_trip() {
    let server = MockServer::start();
    mount_oracle(&server);
    let harness = test_app(&server.base_url()).await;
    let (uid, token) = signup(&harness.app, "a@example.com").await;
    deposit(&harness.app, &uid, 3_000_000, "USD").await;

    // $3.00 at $3000/ETH is 0.001 ETH, i.e. 1_000_000 smallest units.
    let (status, body) = send(
        &harness.app,
        convert_request(&token, json!({ "from": "USD", "to": "ETH", "amount": 3_000_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["converted"]["from"], 3_000_000);
    assert_eq!(body["converted"]["to"], 1_000_000);
    assert_eq!(body["balances"]["USD"], 0);
    assert_eq!(body["balances"]["ETH"], 1_000_000);

    let request = Request::builder()
        .method("GET")
        .uri("/getTransactions")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&harness.app, request).await;
    let entry = &body["transactions"][0];
    assert_eq!(entry["type"], "conversion");
    assert_eq!(entry["currency"], "USD");
    assert_eq!(entry["amount"], 3_000_000);
    assert_eq!(entry["metadata"]["fromCurrency"], "USD");
    assert_eq!(entry["metadata"]["toCurrency"], "ETH");
    assert_eq!(entry["metadata"]["fromAmount"], 3_000_000);
    assert_eq!(entry["metadata"]["toAmount"], 1_000_000);
}

#[tokio::test]
async fn conversion_validation_errors() {
    let server = MockServer::start();
    let oracle = mount_oracle(&server);
    let harness = test_app(&server.base_url()).await;
    let (uid, token) = signup(&harness.app, "a@example.com").await;
    deposit(&harness.app, &uid, 1_000_000, "USD").await;

    // Same source and target.
    let (status, _) = send(
        &harness.app,
        convert_request(&token, json!({ "from": "USD", "to": "USD", "amount": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Non-positive amount.
    let (status, _) = send(
        &harness.app,
        convert_request(&token, json!({ "from": "USD", "to": "ETH", "amount": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unsupported currency.
    let (status, _) = send(
        &harness.app,
        convert_request(&token, json!({ "from": "USD", "to": "XRP", "amount": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // None of the rejects touched the oracle or the ledger.
    oracle.assert_calls(0);
}

#[tokio::test]
async fn dust_conversion_is_rejected_before_the_ledger() {
    let server = MockServer::start();
    mount_oracle(&server);
    let harness = test_app(&server.base_url()).await;
    let (uid, token) = signup(&harness.app, "a@example.com").await;
    deposit(&harness.app, &uid, 1_000, "USD").await;

    // One micro of USD is below one satoshi at any plausible BTC price.
    let (status, body) = send(
        &harness.app,
        convert_request(&token, json!({ "from": "USD", "to": "BTC", "amount": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "amount too small to convert");

    let request = Request::builder()
        .method("GET")
        .uri("/getAccount")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&harness.app, request).await;
    assert_eq!(body["balances"]["USD"], 1_000);
    assert_eq!(body["balances"]["BTC"], 0);
}

#[tokio::test]
async fn conversion_rechecks_balance_inside_the_transaction() {
    let server = MockServer::start();
    mount_oracle(&server);
    let harness = test_app(&server.base_url()).await;
    let (uid, token) = signup(&harness.app, "a@example.com").await;
    deposit(&harness.app, &uid, 500_000, "USD").await;

    let (status, _) = send(
        &harness.app,
        convert_request(&token, json!({ "from": "USD", "to": "ETH", "amount": 600_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn conversion_requires_bearer() {
    let server = MockServer::start();
    mount_oracle(&server);
    let harness = test_app(&server.base_url()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/convert")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "from": "USD", "to": "ETH", "amount": 100 }).to_string(),
        ))
        .unwrap();
    let (status, _) = send(&harness.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn oracle_outage_with_no_snapshot_fails_conversion() {
    let server = MockServer::start();
    server
        .mock(|when, then| {
            when.method(GET).path("/v1/prices");
            then.status(503);
        });
    let harness = test_app(&server.base_url()).await;
    let (uid, token) = signup(&harness.app, "a@example.com").await;
    deposit(&harness.app, &uid, 1_000_000, "USD").await;

    let (status, _) = send(
        &harness.app,
        convert_request(&token, json!({ "from": "USD", "to": "ETH", "amount": 100_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
