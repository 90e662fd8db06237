//! Application state shared across handlers

use std::sync::Arc;
use std::time::{Duration, Instant};

use gatehouse_core::{ConnectionPool, Connector, SessionStore};

use crate::auth::{AccountNames, PasswordHasher, UserDirectory};

/// Settings the auth routes read on every request
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Lifetime of tokens issued at login
    pub session_ttl: Duration,
    /// Code that must be sent in the `name` field at registration
    pub invite_code: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(60 * 60),
            invite_code: "INVITE2024".to_string(),
        }
    }
}

/// Shared application state
pub struct AppState<K: Connector> {
    inner: Arc<AppStateInner<K>>,
}

impl<K: Connector> Clone for AppState<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<K: Connector> {
    pool: ConnectionPool<K>,
    sessions: SessionStore,
    directory: Arc<dyn UserDirectory>,
    hasher: Arc<dyn PasswordHasher>,
    names: AccountNames,
    settings: AuthSettings,
    started: Instant,
}

impl<K: Connector> AppState<K> {
    pub fn new(
        pool: ConnectionPool<K>,
        sessions: SessionStore,
        directory: Arc<dyn UserDirectory>,
        hasher: Arc<dyn PasswordHasher>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pool,
                sessions,
                directory,
                hasher,
                names: AccountNames::new(),
                settings,
                started: Instant::now(),
            }),
        }
    }

    pub fn pool(&self) -> &ConnectionPool<K> {
        &self.inner.pool
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub fn directory(&self) -> &dyn UserDirectory {
        self.inner.directory.as_ref()
    }

    /// Owned handle, for moving into `spawn_blocking`
    pub fn hasher(&self) -> Arc<dyn PasswordHasher> {
        Arc::clone(&self.inner.hasher)
    }

    pub fn names(&self) -> &AccountNames {
        &self.inner.names
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.inner.settings
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Stop the session reaper, then shut the pool down
    pub async fn shutdown(&self) {
        self.inner.sessions.stop_reaper().await;
        self.inner.pool.shutdown().await;
    }
}
