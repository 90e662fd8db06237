//! gatehouse-server: authenticated HTTP service over the gatehouse core
//!
//! Wires a [`gatehouse_core::ConnectionPool`] and a
//! [`gatehouse_core::SessionStore`] into an axum router exposing
//! registration, login, logout and a token-protected business endpoint.

pub mod auth;
pub mod http;
pub mod state;
pub mod telemetry;

pub use auth::{
    AccountNames, Argon2Hasher, DirectoryError, MemoryDirectory, MockHasher, PasswordHasher,
    UserDirectory, UserRecord,
};
pub use http::{build_router, run_server, serve, ApiError, ServerError};
pub use state::{AppState, AuthSettings};
