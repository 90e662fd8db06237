//! PostgreSQL backend via sqlx
//!
//! Each pooled connection is one dedicated `PgConnection`; sqlx's own pool
//! is not used so hand-out order, validation and replenishment stay under
//! [`super::ConnectionPool`]'s control.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection as _;

use super::{Connection, Connector};
use crate::config::DatabaseConfig;
use crate::error::BackendError;

/// Opens PostgreSQL connections from [`DatabaseConfig`]
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        Self { options }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Connection = PgBackend;

    async fn connect(&self) -> Result<PgBackend, BackendError> {
        let conn = PgConnection::connect_with(&self.options).await?;
        tracing::debug!("opened backend connection");
        Ok(PgBackend { conn, open: true })
    }
}

/// A live PostgreSQL connection owned by the pool
pub struct PgBackend {
    conn: PgConnection,
    open: bool,
}

impl PgBackend {
    /// The raw connection, for running queries through sqlx
    pub fn raw(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

#[async_trait]
impl Connection for PgBackend {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn ping(&mut self) -> Result<(), BackendError> {
        let probe: Result<i32, sqlx::Error> = sqlx::query_scalar("SELECT 1")
            .fetch_one(&mut self.conn)
            .await;

        match probe {
            Ok(1) => Ok(()),
            Ok(other) => {
                self.open = false;
                Err(format!("probe returned {} instead of 1", other).into())
            }
            Err(e) => {
                self.open = false;
                Err(e.into())
            }
        }
    }

    async fn close(self) {
        if let Err(e) = self.conn.close().await {
            tracing::debug!(error = %e, "error closing backend connection");
        }
    }
}
