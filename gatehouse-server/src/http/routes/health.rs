//! Health check endpoint

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use gatehouse_core::{Connector, PoolStatus};

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub pool: PoolStatus,
    pub sessions: usize,
}

/// GET /health
async fn health<K: Connector>(State(state): State<AppState<K>>) -> Json<HealthResponse> {
    let pool = state.pool().status();
    Json(HealthResponse {
        status: if pool.running { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime().as_secs(),
        pool,
        sessions: state.sessions().len(),
    })
}

/// Health routes
pub fn router<K: Connector>() -> Router<AppState<K>> {
    Router::new().route("/health", get(health::<K>))
}
