//! Service configuration
//!
//! Loaded from a TOML file with four optional tables:
//!
//! ```toml
//! [database]
//! host = "127.0.0.1"
//! port = 5432
//! user = "web_user"
//! password = "..."
//! database = "web_manager"
//!
//! [pool]
//! max_size = 10
//! min_size = 2
//! acquire_timeout_ms = 5000
//!
//! [sessions]
//! ttl_secs = 3600
//! reaper_interval_secs = 60
//!
//! [http]
//! host = "127.0.0.1"
//! port = 9000
//! invite_code = "INVITE2024"
//! ```
//!
//! Environment variables override the file after parsing:
//! `GATEHOUSE_DB_HOST`, `GATEHOUSE_DB_PORT`, `GATEHOUSE_DB_USER`,
//! `GATEHOUSE_DB_PASSWORD`, `GATEHOUSE_DB_NAME`, `GATEHOUSE_HOST`,
//! `GATEHOUSE_PORT`, `GATEHOUSE_INVITE_CODE`.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pool::PoolOptions;
use crate::session::MAX_REAPER_INTERVAL;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatehouseConfig {
    pub database: DatabaseConfig,
    pub pool: PoolOptions,
    pub sessions: SessionConfig,
    pub http: HttpConfig,
}

/// Connection parameters handed to the connection factory
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "web_user".to_string(),
            password: String::new(),
            database: "web_manager".to_string(),
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Session lifetime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of a token issued at login
    pub ttl_secs: u64,
    /// How often the reaper sweeps expired sessions
    pub reaper_interval_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60,
            reaper_interval_secs: 60,
        }
    }
}

/// HTTP request layer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Code that must be supplied in the `name` field at registration
    pub invite_code: String,
    /// Per-request timeout enforced by the middleware stack
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            invite_code: "INVITE2024".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl GatehouseConfig {
    /// Load config from a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides (no config file)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("GATEHOUSE_DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("GATEHOUSE_DB_PORT") {
            self.database.port = parse_port("GATEHOUSE_DB_PORT", &port)?;
        }
        if let Some(user) = lookup("GATEHOUSE_DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("GATEHOUSE_DB_PASSWORD") {
            self.database.password = password;
        }
        if let Some(name) = lookup("GATEHOUSE_DB_NAME") {
            self.database.database = name;
        }
        if let Some(host) = lookup("GATEHOUSE_HOST") {
            self.http.host = host;
        }
        if let Some(port) = lookup("GATEHOUSE_PORT") {
            self.http.port = parse_port("GATEHOUSE_PORT", &port)?;
        }
        if let Some(code) = lookup("GATEHOUSE_INVITE_CODE") {
            self.http.invite_code = code;
        }
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.max_size == 0 {
            return Err(ConfigError::invalid("pool.max_size", "must be at least 1"));
        }
        if self.pool.min_size > self.pool.max_size {
            return Err(ConfigError::invalid(
                "pool.min_size",
                format!("exceeds max_size ({})", self.pool.max_size),
            ));
        }
        if self.pool.acquire_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "pool.acquire_timeout_ms",
                "must be at least 1; omit it to wait indefinitely",
            ));
        }
        if self.sessions.reaper_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "sessions.reaper_interval_secs",
                "must be at least 1",
            ));
        }
        if self.sessions.reaper_interval_secs > MAX_REAPER_INTERVAL.as_secs() {
            return Err(ConfigError::invalid(
                "sessions.reaper_interval_secs",
                format!("must be at most {}", MAX_REAPER_INTERVAL.as_secs()),
            ));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "http.request_timeout_secs",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn parse_port(field: &'static str, value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, format!("'{}' is not a valid port", value)))
}
