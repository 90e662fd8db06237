//! Tracing setup for the gatehouse binary
//!
//! Usage:
//!   gatehouse --debug                  # Debug logging to console
//!   RUST_LOG=gatehouse_core=debug ...  # Fine-grained log control

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Log at debug level unless RUST_LOG is set
    pub debug: bool,
}

/// Install the global console subscriber. Fails if one is already set.
pub fn init(config: &TracingConfig) -> Result<()> {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
