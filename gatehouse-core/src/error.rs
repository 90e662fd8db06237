/// Structured error types for gatehouse-core.
///
/// Backend failures (connect, probe) are boxed into [`BackendError`] and
/// stop at the pool boundary; callers only ever see [`PoolError`] and
/// [`SessionError`].
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Opaque error from a backend collaborator (connection factory, probe)
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by [`crate::pool::ConnectionPool`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool is not running (never initialised, or shut down while waiting)
    #[error("connection pool is unavailable")]
    Unavailable,

    /// No connection became free before the deadline
    #[error("timed out after {waited:?} waiting for a pooled connection")]
    Timeout { waited: Duration },
}

/// Errors surfaced by [`crate::session::SessionStore`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Token is empty, unknown, or past its expiry
    #[error("session token is invalid or expired")]
    Invalid,

    /// Token to revoke does not exist
    #[error("session token not found")]
    NotFound,
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::config::GatehouseConfig`]
    #[error("invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A value is out of range
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::invalid("pool.min_size", "exceeds max_size (10)");
        assert_eq!(
            err.to_string(),
            "invalid value for 'pool.min_size': exceeds max_size (10)"
        );

        let err = PoolError::Timeout {
            waited: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn backend_error_boxes_any_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: BackendError = io_err.into();
        assert_eq!(err.to_string(), "refused");
    }
}
