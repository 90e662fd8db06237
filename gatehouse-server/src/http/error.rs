//! API error type with IntoResponse
//!
//! Errors become `{ "success": false, "message": ... }` JSON bodies with a
//! matching status code. Internal details are logged, never returned.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use gatehouse_core::{PoolError, SessionError};

use crate::auth::{DirectoryError, HashError};

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or rejected input (400)
    BadRequest { message: String },

    /// Missing, unknown or expired credentials (401)
    Unauthorized { message: &'static str },

    /// Duplicate resource (409)
    Conflict { message: &'static str },

    /// No backend connection could be obtained (503)
    Unavailable(PoolError),

    /// Internal error (500, logged)
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest { message } => message,
            Self::Unauthorized { message } | Self::Conflict { message } => message.to_string(),
            Self::Unavailable(e) => {
                tracing::warn!("backend unavailable: {}", e);
                "service temporarily unavailable".to_string()
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                "an internal error occurred".to_string()
            }
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

impl From<PoolError> for ApiError {
    fn from(e: PoolError) -> Self {
        Self::Unavailable(e)
    }
}

impl From<SessionError> for ApiError {
    fn from(_: SessionError) -> Self {
        Self::Unauthorized {
            message: "invalid or expired token",
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::EmailExists(_) => Self::Conflict {
                message: "email already registered",
            },
            DirectoryError::Backend(message) => Self::Internal { message },
        }
    }
}

impl From<HashError> for ApiError {
    fn from(e: HashError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("JSON parse error: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::time::Duration;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unavailable_is_503() {
        let response = ApiError::from(PoolError::Unavailable).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = ApiError::from(PoolError::Timeout {
            waited: Duration::from_secs(1),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn session_errors_are_401() {
        let response = ApiError::from(SessionError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "invalid or expired token");
    }

    #[tokio::test]
    async fn duplicate_email_is_409() {
        let err = ApiError::from(DirectoryError::EmailExists("a@example.com".into()));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response =
            ApiError::from(DirectoryError::Backend("connection reset".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["message"], "an internal error occurred");
    }
}
