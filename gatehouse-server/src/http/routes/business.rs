//! Protected business endpoint
//!
//! Each request borrows one pooled backend connection for the duration of its
//! work and hands it back before responding.

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::Serialize;

use gatehouse_core::{Connection, Connector, Role};

use crate::http::error::ApiError;
use crate::http::extractors::Authenticated;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BusinessResponse {
    pub success: bool,
    pub message: &'static str,
    pub email: String,
    pub role: Role,
}

/// POST /api/business
async fn business<K: Connector>(
    State(state): State<AppState<K>>,
    Authenticated(identity): Authenticated,
) -> Result<Json<BusinessResponse>, ApiError> {
    let mut conn = state.pool().get().await?;

    let outcome = conn.ping().await;
    conn.release().await;
    outcome.map_err(|e| ApiError::internal(format!("backend round-trip failed: {}", e)))?;

    tracing::debug!(identity = %identity.email, "business request served");
    Ok(Json(BusinessResponse {
        success: true,
        message: "ok",
        email: identity.email,
        role: identity.role,
    }))
}

/// Business routes
pub fn router<K: Connector>() -> Router<AppState<K>> {
    Router::new().route("/api/business", post(business::<K>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::http::StatusCode;
    use gatehouse_core::{Identity, PoolOptions};

    fn alice() -> Authenticated {
        Authenticated(Identity {
            email: "alice@example.com".into(),
            role: Role::Admin,
        })
    }

    #[tokio::test]
    async fn borrows_and_returns_a_connection() {
        let state = test_state();
        state.pool().init(PoolOptions::new(1, 1)).await;

        let Json(body) = business(State(state.clone()), alice()).await.unwrap();
        assert_eq!(body.email, "alice@example.com");
        assert_eq!(body.role, Role::Admin);

        let status = state.pool().status();
        assert_eq!(status.idle, 1);
        assert_eq!(status.total_live, 1);
    }

    #[tokio::test]
    async fn stopped_pool_is_503() {
        let err = business(State(test_state()), alice()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
