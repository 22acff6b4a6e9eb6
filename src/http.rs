use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::{self, AuthService, ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};
use crate::currency::Currency;
use crate::error::{GatewayError, Result};
use crate::gateway::Gateway;
use crate::store::LedgerStore;

const DEFAULT_TRANSACTION_PAGE: u32 = 50;
const MAX_TRANSACTION_PAGE: u32 = 100;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct AppState {
    gateway: Arc<Gateway>,
    auth: Arc<AuthService>,
    store: LedgerStore,
}

impl AppState {
    pub fn new(gateway: Gateway, auth: AuthService, store: LedgerStore) -> Self {
        Self {
            gateway: Arc::new(gateway),
            auth: Arc::new(auth),
            store,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/getAccount", get(get_account))
        .route("/getTransactions", get(get_transactions))
        .route("/deposit", post(admin_deposit))
        .route("/transfer", post(transfer))
        .route("/convert", post(convert))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let registry = state.gateway.registry();
    let models: Vec<Value> = state
        .gateway
        .pricing()
        .models()
        .map(|(model, pricing)| {
            serde_json::json!({
                "id": model,
                "provider": registry.route(model).as_str(),
                "pricing": {
                    "input_per_million_tokens_usd":
                        pricing.input_usd_micros_per_million as f64 / 1_000_000.0,
                    "output_per_million_tokens_usd":
                        pricing.output_usd_micros_per_million as f64 / 1_000_000.0,
                },
            })
        })
        .collect();
    Json(serde_json::json!({ "models": models }))
}

async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse> {
    let uid = state.auth.verify_bearer(&headers)?;
    let completed = state.gateway.complete(&uid, body).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        "x-often-cost-micros",
        header_value(completed.cost_usd_micros.to_string()),
    );
    response_headers.insert(
        "x-often-balance-micros",
        header_value(completed.balance_after.to_string()),
    );
    response_headers.insert(
        "x-often-provider",
        header_value(completed.provider.as_str().to_string()),
    );
    Ok((response_headers, Json(completed.body)))
}

fn header_value(value: String) -> HeaderValue {
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("invalid"))
}

#[derive(Debug, Deserialize)]
struct SignupRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    #[serde(rename = "idToken")]
    id_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
    #[serde(rename = "expiresIn")]
    expires_in: i64,
    uid: String,
}

async fn issue_session(state: &AppState, uid: &str, email: &str) -> Result<TokenResponse> {
    let id_token = state.auth.issue_access_token(uid, email)?;
    let refresh_token = uuid::Uuid::new_v4().to_string();
    let expires_at_ms = chrono::Utc::now().timestamp_millis() + REFRESH_TOKEN_TTL_SECS * 1_000;
    state
        .store
        .insert_refresh_token(&auth::hash_token(&refresh_token), uid, expires_at_ms)
        .await?;
    Ok(TokenResponse {
        id_token,
        refresh_token,
        expires_in: ACCESS_TOKEN_TTL_SECS,
        uid: uid.to_string(),
    })
}

fn validate_signup(body: &SignupRequest) -> Result<(String, String)> {
    let email = body
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty() && email.contains('@'))
        .ok_or_else(|| GatewayError::Validation("a valid email is required".to_string()))?;
    let password = body
        .password
        .as_deref()
        .filter(|password| password.len() >= MIN_PASSWORD_LEN)
        .ok_or_else(|| {
            GatewayError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            ))
        })?;
    Ok((email.to_string(), password.to_string()))
}

async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<impl IntoResponse> {
    let (email, password) = validate_signup(&body)?;
    let salt = auth::generate_salt();
    let hash = auth::hash_password(&salt, &password);
    let account = state.store.create_account(&email, &salt, &hash).await?;
    tracing::info!(uid = %account.uid, "account created");
    let tokens = issue_session(&state, &account.uid, &email).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<Json<TokenResponse>> {
    let (email, password) = validate_signup(&body)?;
    let (uid, salt, hash) = state
        .store
        .find_credentials(&email)
        .await?
        .ok_or(GatewayError::InvalidToken)?;
    if !auth::verify_password(&salt, &password, &hash) {
        return Err(GatewayError::InvalidToken);
    }
    let tokens = issue_session(&state, &uid, &email).await?;
    Ok(Json(tokens))
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>> {
    let token = body
        .refresh_token
        .as_deref()
        .filter(|token| !token.trim().is_empty())
        .ok_or(GatewayError::InvalidToken)?;
    let uid = state
        .store
        .take_refresh_token(&auth::hash_token(token), chrono::Utc::now().timestamp_millis())
        .await?;
    let account = state.store.get_account(&uid).await?;
    let tokens = issue_session(&state, &uid, &account.email).await?;
    Ok(Json(tokens))
}

async fn get_account(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let uid = state.auth.verify_bearer(&headers)?;
    let account = state.store.get_account(&uid).await?;
    Ok(Json(serde_json::json!({
        "uid": account.uid,
        "balances": account.balances,
        "status": account.status,
        "supportedCurrencies": Currency::ALL,
    })))
}

#[derive(Debug, Deserialize)]
struct TransactionsQuery {
    limit: Option<u32>,
    #[serde(rename = "startAfter")]
    start_after: Option<String>,
}

async fn get_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Value>> {
    let uid = state.auth.verify_bearer(&headers)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRANSACTION_PAGE)
        .clamp(1, MAX_TRANSACTION_PAGE);
    let transactions = state
        .store
        .list_transactions(&uid, limit, query.start_after)
        .await?;
    Ok(Json(serde_json::json!({ "transactions": transactions })))
}

#[derive(Debug, Deserialize)]
struct DepositRequest {
    #[serde(rename = "accountId")]
    account_id: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
}

async fn admin_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DepositRequest>,
) -> Result<Json<Value>> {
    let provided_key = headers
        .get("x-admin-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    // The key gate comes first; the body is not even validated until the
    // caller has proven they hold the key.
    state.gateway.check_admin_key(provided_key)?;

    let account_id = body.account_id.as_deref().unwrap_or_default();
    let currency = parse_currency(body.currency.as_deref())?;
    let amount = positive_amount(body.amount)?;

    let balance = state
        .gateway
        .deposit(provided_key, account_id, currency, amount)
        .await?;
    Ok(Json(serde_json::json!({
        "currency": currency,
        "balance": balance,
    })))
}

#[derive(Debug, Deserialize)]
struct TransferRequest {
    #[serde(rename = "toAccountId")]
    to_account_id: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
    description: Option<String>,
}

async fn transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TransferRequest>,
) -> Result<Json<Value>> {
    let sender = state.auth.verify_bearer(&headers)?;
    let recipient = body
        .to_account_id
        .as_deref()
        .map(str::trim)
        .filter(|recipient| !recipient.is_empty())
        .ok_or_else(|| GatewayError::Validation("toAccountId is required".to_string()))?;
    let currency = parse_currency(body.currency.as_deref())?;
    let amount = positive_amount(body.amount)?;
    let description = body.description.as_deref().unwrap_or("Transfer");

    let balance = state
        .gateway
        .transfer(&sender, recipient, currency, amount, description)
        .await?;
    Ok(Json(serde_json::json!({
        "currency": currency,
        "balance": balance,
    })))
}

#[derive(Debug, Deserialize)]
struct ConvertRequest {
    from: Option<String>,
    to: Option<String>,
    amount: Option<i64>,
}

async fn convert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ConvertRequest>,
) -> Result<Json<Value>> {
    let uid = state.auth.verify_bearer(&headers)?;
    let from = parse_currency(body.from.as_deref())?;
    let to = parse_currency(body.to.as_deref())?;
    let amount = positive_amount(body.amount)?;

    let converted = state.gateway.convert(&uid, from, to, amount).await?;

    let mut balances = Map::new();
    balances.insert(
        converted.from.code().to_string(),
        Value::from(converted.from_balance),
    );
    balances.insert(
        converted.to.code().to_string(),
        Value::from(converted.to_balance),
    );
    Ok(Json(serde_json::json!({
        "converted": {
            "from": converted.from_amount,
            "to": converted.to_amount,
        },
        "balances": balances,
    })))
}

fn parse_currency(raw: Option<&str>) -> Result<Currency> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| GatewayError::Validation("currency is required".to_string()))?;
    raw.parse::<Currency>()
        .map_err(|err| GatewayError::Validation(err.to_string()))
}

fn positive_amount(amount: Option<i64>) -> Result<u64> {
    match amount {
        Some(amount) if amount > 0 => Ok(amount as u64),
        Some(_) => Err(GatewayError::Validation(
            "amount must be positive".to_string(),
        )),
        None => Err(GatewayError::Validation("amount is required".to_string())),
    }
}
