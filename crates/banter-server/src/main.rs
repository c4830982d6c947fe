//! # Banter Server
//!
//! Main binary that runs both Banter services in one process:
//! - REST API (accounts, sessions, health)
//! - WebSocket chat gateway

use banter_api::{
    auth::Argon2Verifier,
    build_router,
    sessions::{SessionDeps, SessionService},
    AppState,
};
use banter_common::{
    clock::SystemClock,
    config::{LogConfig, LogFormat},
    snowflake::RandomIdGenerator,
};
use banter_db::{
    repository::{
        accounts::PgAccounts,
        sessions::{RedisSessionStore, SessionTtl},
    },
    Database,
};
use banter_gateway::GatewayState;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "banter", version, about = "Account, session and realtime chat server")]
struct Cli {
    /// Config file stem; `config` picks up config.toml, config.yaml, ...
    #[arg(long, env = "BANTER_CONFIG", default_value = "config")]
    config: String,

    /// Don't run database migrations on startup
    #[arg(long)]
    skip_migrations: bool,
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    match log.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = banter_common::config::init(&cli.config)?;

    init_tracing(&config.log);

    tracing::info!("Starting Banter v{}", env!("CARGO_PKG_VERSION"));

    // Connect to databases
    let db = Database::connect(config).await?;

    if cli.skip_migrations {
        tracing::warn!("Skipping database migrations");
    } else {
        db.migrate().await?;
    }

    // === Sessions ===
    let ttl = SessionTtl::new(config.sessions.ttl());
    let sessions = SessionService::new(SessionDeps {
        store: Arc::new(RedisSessionStore::new(
            db.redis.clone(),
            Arc::new(SystemClock),
            ttl,
        )),
        accounts: Arc::new(PgAccounts::new(db.pg.clone())),
        verifier: Arc::new(Argon2Verifier),
        ids: Arc::new(RandomIdGenerator),
    });
    tracing::info!(ttl_secs = ttl.as_secs(), "Session store ready");

    let host: std::net::IpAddr = config.server.host.parse()?;

    // === REST API Server ===
    let api_router = build_router(AppState {
        pg: db.pg.clone(),
        redis: Some(db.redis.clone()),
        sessions: sessions.clone(),
    });
    let api_addr = SocketAddr::new(host, config.server.port);

    // === WebSocket Gateway ===
    let gateway_router =
        banter_gateway::build_router(GatewayState::new(sessions, config.gateway.clone()));
    let gateway_addr = SocketAddr::new(host, config.server.gateway_port);

    tracing::info!("REST API listening on http://{api_addr}");
    tracing::info!("Gateway listening on ws://{gateway_addr}/v1/ws");

    // Run both servers concurrently
    tokio::try_join!(
        async {
            let listener = tokio::net::TcpListener::bind(api_addr).await?;
            axum::serve(listener, api_router).await?;
            Ok::<_, anyhow::Error>(())
        },
        async {
            let listener = tokio::net::TcpListener::bind(gateway_addr).await?;
            axum::serve(listener, gateway_router).await?;
            Ok::<_, anyhow::Error>(())
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["banter"]).unwrap();
        assert_eq!(cli.config, "config");
        assert!(!cli.skip_migrations);

        let cli = Cli::try_parse_from(["banter", "--config", "prod", "--skip-migrations"]).unwrap();
        assert_eq!(cli.config, "prod");
        assert!(cli.skip_migrations);
    }
}
