use axum::http::HeaderMap;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{GatewayError, Result};

pub const ACCESS_TOKEN_TTL_SECS: i64 = 3_600;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 3_600;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies the gateway's bearer credentials. Access tokens are
/// HS256 JWTs; refresh tokens are opaque and live hashed in the store.
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_access_token(&self, uid: &str, email: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: uid.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + ACCESS_TOKEN_TTL_SECS,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| GatewayError::Internal(format!("jwt encode error: {err}")))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| GatewayError::InvalidToken)
    }

    /// Extracts and verifies the `Authorization: Bearer` credential.
    /// Fails closed: no header, wrong scheme, or an empty token is
    /// `Unauthenticated`; a present-but-rejected token is `InvalidToken`.
    pub fn verify_bearer(&self, headers: &HeaderMap) -> Result<String> {
        let auth = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .ok_or(GatewayError::Unauthenticated)?
            .trim();
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(GatewayError::Unauthenticated)?;
        let claims = self.verify_access_token(token)?;
        Ok(claims.sub)
    }
}

/// 16-byte random salt, hex-encoded.
pub fn generate_salt() -> String {
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// SHA-256(salt || password), hex-encoded.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_password(salt: &str, candidate: &str, stored_hash: &str) -> bool {
    let candidate_hash = hash_password(salt, candidate);
    candidate_hash.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

/// Hash for at-rest refresh tokens; the raw token never touches the store.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Constant-time equality over arbitrary-length strings. Both sides are
/// digested first so a length mismatch cannot short-circuit the comparison.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.as_slice().ct_eq(b.as_slice()).into()
}
