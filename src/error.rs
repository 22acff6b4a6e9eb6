use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing or malformed bearer credential")]
    Unauthenticated,
    #[error("invalid or expired credential")]
    InvalidToken,
    #[error("invalid admin key")]
    ForbiddenAdmin,
    #[error("{0}")]
    Validation(String),
    #[error("account not found")]
    AccountNotFound,
    #[error("recipient account not found")]
    RecipientNotFound,
    #[error("{0}")]
    InsufficientFunds(String),
    #[error("provider unconfigured: {0}")]
    ProviderUnconfigured(String),
    #[error("upstream error ({status}): {detail}")]
    Upstream { status: StatusCode, detail: String },
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthenticated | GatewayError::InvalidToken => StatusCode::UNAUTHORIZED,
            GatewayError::ForbiddenAdmin => StatusCode::FORBIDDEN,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::AccountNotFound | GatewayError::RecipientNotFound => {
                StatusCode::NOT_FOUND
            }
            GatewayError::InsufficientFunds(_) => StatusCode::PAYMENT_REQUIRED,
            GatewayError::ProviderUnconfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::UpstreamUnreachable(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            GatewayError::Upstream { detail, .. } => serde_json::json!({
                "error": "upstream error",
                "detail": detail,
            }),
            GatewayError::Internal(detail) => {
                tracing::error!("internal error: {detail}");
                serde_json::json!({ "error": "internal server error" })
            }
            GatewayError::UpstreamUnreachable(detail) => {
                tracing::warn!("upstream unreachable: {detail}");
                serde_json::json!({ "error": "upstream unreachable" })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
