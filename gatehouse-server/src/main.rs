use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use gatehouse_core::{ConnectionPool, GatehouseConfig, PgConnector, SessionStore};
use gatehouse_server::telemetry::{self, TracingConfig};
use gatehouse_server::{run_server, AppState, Argon2Hasher, AuthSettings, MemoryDirectory};

/// Authenticated HTTP service with pooled backend connections
#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about)]
struct Cli {
    /// Path to a TOML config file; defaults plus environment otherwise
    #[arg(short, long, env = "GATEHOUSE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    telemetry::init(&TracingConfig { debug: cli.debug })?;

    let mut config = match &cli.config {
        Some(path) => GatehouseConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => GatehouseConfig::from_env().context("invalid environment configuration")?,
    };
    if let Some(port) = cli.port {
        config.http.port = port;
    }
    tracing::debug!(?config, "configuration loaded");

    let pool = ConnectionPool::new(PgConnector::new(&config.database));
    pool.init(config.pool.clone()).await;

    let state = AppState::new(
        pool,
        SessionStore::new(),
        Arc::new(MemoryDirectory::new()),
        Arc::new(Argon2Hasher),
        AuthSettings {
            session_ttl: config.sessions.ttl(),
            invite_code: config.http.invite_code.clone(),
        },
    );

    run_server(state, &config).await?;
    Ok(())
}
