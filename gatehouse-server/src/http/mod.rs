//! HTTP request layer
//!
//! Axum server with:
//! - Request tracing and a per-request timeout
//! - Bearer-token authentication for protected routes
//! - Graceful shutdown that stops the session reaper and then the pool
//! - JSON error responses

pub mod error;
pub mod extractors;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, run_server, serve, ServerError};
