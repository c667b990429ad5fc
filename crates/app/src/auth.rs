use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use rentdesk_core::password::verify_password;
use rentdesk_core::types::{UserAccount, UserRole, UserStatus};

use crate::envelope::{ok, ApiError, ApiJson, ApiResult};
use crate::router::AppState;

/// Issues and checks HS256 access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the application clock in `verify`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, account: &UserAccount, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = TokenClaims {
            sub: account.id.clone(),
            role: account.role.as_str().to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| TokenError::Encode(err.to_string()))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("failed to sign token: {0}")]
    Encode(String),
}

/// Account of the admin that passed [`require_admin`], stored in request extensions.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserAccount);

/// Guards every admin route: a valid bearer token for an active admin.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Access denied. No token provided"))?;

    let claims = state
        .tokens()
        .verify(token, state.now())
        .map_err(|err| ApiError::unauthorized(err.to_string()))?;

    let account = state
        .storage()
        .users()
        .fetch_account(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid token - User not found"))?;

    if account.status != UserStatus::Active {
        return Err(ApiError::forbidden("Account is not active"));
    }
    if account.role != UserRole::Admin {
        return Err(ApiError::forbidden("Access denied. Admin privileges required"));
    }

    request.extensions_mut().insert(AdminUser(account));
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (_, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginUser {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    role: UserRole,
    status: UserStatus,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    user: LoginUser,
}

/// `POST /api/auth/login`
pub async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<LoginRequest>) -> ApiResult {
    let result = authenticate(&state, body).await;
    let label = match &result {
        Ok(_) => "success",
        Err(err) if err.status().is_client_error() => "rejected",
        Err(_) => "error",
    };
    counter!("auth_login_total", "result" => label).increment(1);
    result
}

async fn authenticate(state: &AppState, body: LoginRequest) -> ApiResult {
    let invalid = || ApiError::unauthorized("Invalid credentials");
    let email = body.email.unwrap_or_default();
    let password = body.password.unwrap_or_default();

    let Some(account) = state
        .storage()
        .users()
        .find_account_by_email(&email, UserRole::Admin)
        .await?
    else {
        warn!(stage = "auth", "login for unknown admin");
        return Err(invalid());
    };

    let hash = account.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(ApiError::internal)?;
    if !matches {
        warn!(stage = "auth", user_id = %account.id, "login with wrong password");
        return Err(invalid());
    }

    let token = state
        .tokens()
        .issue(&account, state.now())
        .map_err(ApiError::internal)?;
    info!(stage = "auth", user_id = %account.id, "admin logged in");

    Ok(ok(LoginResponse {
        token,
        user: LoginUser {
            id: account.id,
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            role: account.role,
            status: account.status,
        },
    }))
}
