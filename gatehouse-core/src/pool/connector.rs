//! Backend collaborator traits
//!
//! The pool knows nothing about the backend beyond these two seams: a
//! factory that produces one live connection or fails, and a connection
//! that can report whether it is open and answer a trivial probe.

use async_trait::async_trait;

use crate::error::BackendError;

/// One exclusive backend connection
#[async_trait]
pub trait Connection: Sized + Send + 'static {
    /// Whether the connection still considers itself open
    fn is_open(&self) -> bool;

    /// Trivial round-trip against the backend (e.g. `SELECT 1`)
    async fn ping(&mut self) -> Result<(), BackendError>;

    /// Tear the connection down. Failures are the implementation's to log.
    async fn close(self);
}

/// Factory for new connections, holding the connection parameters
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    async fn connect(&self) -> Result<Self::Connection, BackendError>;
}
