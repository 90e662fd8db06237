//! Account endpoints: register, login, logout

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use gatehouse_core::{Connector, Role};

use super::MessageResponse;
use crate::auth::UserRecord;
use crate::http::error::ApiError;
use crate::http::extractors::SessionToken;
use crate::state::AppState;

/// Sent for both unknown emails and wrong passwords
const BAD_CREDENTIALS: &str = "invalid email or password";

/// Registration request; `name` carries the invite code
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: &'static str,
    pub token: String,
    pub role: Role,
}

/// POST /api/register
async fn register<K: Connector>(
    State(state): State<AppState<K>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(request) = payload?;

    if request.name != state.settings().invite_code {
        return Err(ApiError::bad_request("invalid invite code"));
    }
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    let hasher = state.hasher();
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| ApiError::internal(format!("hashing task failed: {}", e)))??;

    let record = UserRecord {
        name: state.names().next_name(),
        email: email.to_string(),
        password_hash,
        role: Role::User,
    };
    let name = record.name.clone();
    state.directory().create(record).await?;

    tracing::info!(identity = %email, %name, "account registered");
    Ok((StatusCode::CREATED, Json(MessageResponse::ok("registered"))))
}

/// POST /api/login
async fn login<K: Connector>(
    State(state): State<AppState<K>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload?;
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    let unauthorized = || ApiError::Unauthorized {
        message: BAD_CREDENTIALS,
    };

    let Some(user) = state.directory().find_by_email(email).await? else {
        tracing::debug!(identity = %email, "login for unknown account");
        return Err(unauthorized());
    };

    let hasher = state.hasher();
    let password = request.password;
    let stored = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
        .await
        .map_err(|e| ApiError::internal(format!("verification task failed: {}", e)))?;
    if !verified {
        tracing::debug!(identity = %email, "login with wrong password");
        return Err(unauthorized());
    }

    let token = state
        .sessions()
        .issue(&user.email, user.role, state.settings().session_ttl);
    tracing::info!(identity = %user.email, role = user.role.as_str(), "login succeeded");

    Ok(Json(LoginResponse {
        success: true,
        message: "logged in",
        token,
        role: user.role,
    }))
}

/// POST /api/logout
async fn logout<K: Connector>(
    State(state): State<AppState<K>>,
    SessionToken(token): SessionToken,
) -> Result<Json<MessageResponse>, ApiError> {
    let token = token.ok_or(ApiError::Unauthorized {
        message: "missing or invalid token",
    })?;

    state.sessions().revoke(&token)?;
    Ok(Json(MessageResponse::ok("logged out")))
}

/// Account routes
pub fn router<K: Connector>() -> Router<AppState<K>> {
    Router::new()
        .route("/api/register", post(register::<K>))
        .route("/api/login", post(login::<K>))
        .route("/api/logout", post(logout::<K>))
}
