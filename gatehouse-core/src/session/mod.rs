//! In-memory session store with lazy expiry and a background reaper
//!
//! Tokens map to an identity, a role and an absolute expiry. A session past
//! its expiry is never reported valid: `validate` removes it on sight, and the
//! reaper removes the ones nobody looks up again.
//!
//! There is no cap on the number of live sessions; multiple sessions per
//! identity are allowed.

mod reaper;
mod token;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;
use reaper::Reaper;
use token::TokenGenerator;

/// Upper bound for a session lifetime; longer TTLs are clamped
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Shortest reaper period; shorter requests are raised to this
pub const MIN_REAPER_INTERVAL: Duration = Duration::from_millis(10);

/// Longest reaper period; longer requests are lowered to this
pub const MAX_REAPER_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Privilege level attached to a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Numeric code as stored by the account directory
    pub fn code(self) -> i32 {
        match self {
            Self::User => 0,
            Self::Admin => 1,
        }
    }

    /// Unknown codes fall back to [`Role::User`]
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Admin,
            _ => Self::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// Who a valid token belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub email: String,
    pub role: Role,
}

/// One authenticated login
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Expired once `now` reaches the expiry instant
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Shared handle to the session store. Cloning is cheap.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    sessions: Mutex<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    tokens: TokenGenerator,
    reaper: Mutex<Option<Reaper>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store reading time from `clock` (tests use [`crate::ManualClock`])
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                sessions: Mutex::new(HashMap::new()),
                clock,
                tokens: TokenGenerator::default(),
                reaper: Mutex::new(None),
            }),
        }
    }

    /// Create a session for `email` expiring `ttl` from now and return its
    /// token. Never fails.
    pub fn issue(&self, email: &str, role: Role, ttl: Duration) -> String {
        let now = self.inner.clock.now();
        let ttl = chrono::Duration::from_std(ttl.min(MAX_TTL)).unwrap_or_else(|_| chrono::Duration::zero());
        let expires_at = now + ttl;

        let mut token = self.inner.tokens.generate(email, now);
        let mut sessions = self.inner.sessions();
        while sessions.contains_key(&token) {
            token = self.inner.tokens.generate(email, now);
        }

        sessions.insert(
            token.clone(),
            Session {
                token: token.clone(),
                identity: Identity {
                    email: email.to_string(),
                    role,
                },
                issued_at: now,
                expires_at,
            },
        );
        drop(sessions);

        tracing::debug!(identity = %email, %expires_at, "session issued");
        token
    }

    /// Look up a token. Expired sessions are removed and reported invalid;
    /// valid ones are not extended.
    pub fn validate(&self, token: &str) -> Result<Identity, SessionError> {
        if token.is_empty() {
            return Err(SessionError::Invalid);
        }

        let now = self.inner.clock.now();
        let mut sessions = self.inner.sessions();

        match sessions.get(token) {
            None => return Err(SessionError::Invalid),
            Some(session) if !session.is_expired(now) => return Ok(session.identity.clone()),
            Some(_) => {}
        }

        if let Some(session) = sessions.remove(token) {
            tracing::debug!(identity = %session.identity.email, "expired session removed on lookup");
        }
        Err(SessionError::Invalid)
    }

    /// Remove a token (logout)
    pub fn revoke(&self, token: &str) -> Result<(), SessionError> {
        match self.inner.sessions().remove(token) {
            Some(session) => {
                tracing::debug!(identity = %session.identity.email, "session revoked");
                Ok(())
            }
            None => Err(SessionError::NotFound),
        }
    }

    /// Remove every expired session now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    /// Live entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.inner.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the background sweep. Idempotent while a reaper is running.
    ///
    /// `interval` is clamped to
    /// [`MIN_REAPER_INTERVAL`]..=[`MAX_REAPER_INTERVAL`]. Must be called from
    /// within a tokio runtime.
    pub fn start_reaper(&self, interval: Duration) {
        let requested = interval;
        let interval = interval.clamp(MIN_REAPER_INTERVAL, MAX_REAPER_INTERVAL);
        if interval != requested {
            tracing::warn!(
                ?requested,
                used = ?interval,
                "session reaper interval out of range; clamped"
            );
        }

        let mut reaper = self.inner.reaper();
        if reaper.as_ref().is_some_and(|r| !r.is_finished()) {
            tracing::debug!("session reaper already running");
            return;
        }

        *reaper = Some(Reaper::spawn(Arc::downgrade(&self.inner), interval));
        tracing::info!(?interval, "session reaper started");
    }

    /// Stop the background sweep and wait for it to exit. Idempotent.
    pub async fn stop_reaper(&self) {
        let reaper = self.inner.reaper().take();
        if let Some(reaper) = reaper {
            reaper.stop().await;
            tracing::info!("session reaper stopped");
        }
    }

    pub fn reaper_running(&self) -> bool {
        self.inner
            .reaper()
            .as_ref()
            .is_some_and(|r| !r.is_finished())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreInner {
    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reaper(&self) -> MutexGuard<'_, Option<Reaper>> {
        self.reaper.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let before = sessions.len();

        sessions.retain(|_, session| {
            if session.is_expired(now) {
                tracing::info!(
                    identity = %session.identity.email,
                    expired_at = %session.expires_at,
                    "expired session removed"
                );
                false
            } else {
                true
            }
        });

        before - sessions.len()
    }
}
