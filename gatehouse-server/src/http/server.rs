//! Axum server setup
//!
//! Startup order: the pool is initialised by the caller, the session reaper is
//! started once the listener is bound. Shutdown runs in reverse: stop serving,
//! join the reaper, shut the pool down.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use gatehouse_core::{Connector, GatehouseConfig};

use super::routes;
use crate::state::AppState;

/// Build the application router with all routes
pub fn build_router<K: Connector>(state: AppState<K>, request_timeout: Duration) -> Router {
    Router::new()
        .merge(routes::health::router::<K>())
        .merge(routes::account::router::<K>())
        .merge(routes::business::router::<K>())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM.
pub async fn run_server<K: Connector>(
    state: AppState<K>,
    config: &GatehouseConfig,
) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .map_err(|_| {
            ServerError::InvalidAddress(format!("{}:{}", config.http.host, config.http.port))
        })?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    serve(
        listener,
        state,
        Duration::from_secs(config.http.request_timeout_secs),
        config.sessions.reaper_interval(),
        shutdown_signal(),
    )
    .await
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// Starts the session reaper before accepting connections. After the last
/// in-flight request finishes the reaper is joined and the pool shut down,
/// whether or not serving ended in an error.
pub async fn serve<K, F>(
    listener: TcpListener,
    state: AppState<K>,
    request_timeout: Duration,
    reaper_interval: Duration,
    shutdown: F,
) -> Result<(), ServerError>
where
    K: Connector,
    F: Future<Output = ()> + Send + 'static,
{
    state.sessions().start_reaper(reaper_interval);

    let app = build_router(state.clone(), request_timeout);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    state.shutdown().await;
    tracing::info!("Server shutdown complete");

    served.map_err(ServerError::from)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address: {0}")]
    InvalidAddress(String),
}
