//! # banter-db
//!
//! Storage layer for Banter. Manages connections to:
//! - **PostgreSQL**: accounts (relational data)
//! - **Redis**: session records, expired by Redis itself
//!
//! The stores the core talks to are traits ([`repository::sessions::SessionStore`],
//! [`repository::accounts::AccountLookup`]); [`memory`] has in-process implementations
//! of both for tests and single-binary development.

pub mod memory;
pub mod postgres;
pub mod redis_pool;
pub mod repository;

use anyhow::Result;
use sqlx::PgPool;

/// Shared database handles, cloned into whatever needs them.
#[derive(Clone)]
pub struct Database {
    pub pg: PgPool,
    pub redis: redis::aio::ConnectionManager,
}

impl Database {
    /// Connect to all database backends.
    pub async fn connect(config: &banter_common::config::AppConfig) -> Result<Self> {
        tracing::info!("Connecting to PostgreSQL...");
        let pg = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await?;

        tracing::info!("Connected to PostgreSQL");

        tracing::info!("Connecting to Redis...");
        let redis_client = redis::Client::open(config.redis.url.as_str())?;
        let redis = redis::aio::ConnectionManager::new(redis_client).await?;
        tracing::info!("Connected to Redis");

        Ok(Self { pg, redis })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pg).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }
}
