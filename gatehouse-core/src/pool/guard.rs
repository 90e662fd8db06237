//! Scoped checkout of a pooled connection

use std::fmt;
use std::ops::{Deref, DerefMut};

use super::{ConnectionPool, Connector};

/// A connection checked out of a [`ConnectionPool`].
///
/// Exclusively owned until released. Prefer [`release`](Self::release) on
/// the happy path; on any other exit path (early return, `?`, panic) the
/// drop handler hands the connection back on the current tokio runtime.
pub struct PooledConnection<K: Connector> {
    conn: Option<K::Connection>,
    pool: ConnectionPool<K>,
    generation: u64,
}

impl<K: Connector> PooledConnection<K> {
    pub(crate) fn new(conn: K::Connection, pool: ConnectionPool<K>, generation: u64) -> Self {
        Self {
            conn: Some(conn),
            pool,
            generation,
        }
    }

    /// Return the connection to its pool, validating it first
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.check_in(conn, self.generation).await;
        }
    }
}

impl<K: Connector> Deref for PooledConnection<K> {
    type Target = K::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("BUG: PooledConnection used after release")
    }
}

impl<K: Connector> DerefMut for PooledConnection<K> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("BUG: PooledConnection used after release")
    }
}

impl<K: Connector> fmt::Debug for PooledConnection<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("generation", &self.generation)
            .field("released", &self.conn.is_none())
            .finish()
    }
}

impl<K: Connector> Drop for PooledConnection<K> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                let generation = self.generation;
                handle.spawn(async move {
                    pool.check_in(conn, generation).await;
                });
            }
            Err(_) => {
                // No runtime to validate on; give the capacity back and let
                // the connection go.
                tracing::warn!("no tokio runtime during connection drop; discarding connection");
                self.pool.forget();
                drop(conn);
            }
        }
    }
}
