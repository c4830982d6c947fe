//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config file > defaults

use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`].
pub fn get() -> &'static AppConfig {
    CONFIG.get().expect("Config not initialized. Call banter_common::config::init() first.")
}

/// Initialize the global configuration from environment.
///
/// `file` is the config file stem (e.g. `config` picks up `config.toml`, `config.yaml`, ...).
/// Should be called once at application startup, before any other code accesses config.
pub fn init(file: &str) -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let app_config = load(file)?;
    Ok(CONFIG.get_or_init(|| app_config))
}

/// Build a configuration without installing it globally.
pub fn load(file: &str) -> Result<AppConfig, config::ConfigError> {
    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.gateway_port", 8081)?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 5)?
        .set_default("sessions.ttl_secs", 2_592_000)? // 30 days
        .set_default("gateway.handshake_timeout_secs", 10)?
        .set_default("gateway.outbound_buffer", 64)?
        .set_default("gateway.send_timeout_ms", 2_000)?
        .set_default("log.format", "text")?
        .set_default("log.filter", "banter=debug,tower_http=debug")?
        // Optional config file
        .add_source(config::File::with_name(file).required(false))
        // Environment variables (BANTER__SERVER__HOST, BANTER__REDIS__URL, etc.)
        .add_source(
            config::Environment::with_prefix("BANTER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    cfg.try_deserialize()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub sessions: SessionsConfig,
    pub gateway: GatewayConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// REST API port
    pub port: u16,
    /// WebSocket gateway port
    pub gateway_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (session records live here)
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    /// Lifetime of a session record in seconds. Redis expires the key on its own.
    pub ttl_secs: u64,
}

impl SessionsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// How long a fresh connection may take to send its session id
    pub handshake_timeout_secs: u64,
    /// Per-connection outbound frame queue depth
    pub outbound_buffer: usize,
    /// How long a fan-out write waits on a full recipient queue before giving up
    pub send_timeout_ms: u64,
}

impl GatewayConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output for local development
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    pub filter: String,
}
