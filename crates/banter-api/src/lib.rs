//! # banter-api
//!
//! REST API layer for Banter: accounts, sessions and health. Also home of the
//! [`sessions::SessionService`], which the websocket gateway shares.

pub mod auth;
pub mod middleware;
pub mod responses;
pub mod routes;
pub mod sessions;

use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::sync::Arc;

use crate::sessions::SessionService;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Accounts live here
    pub pg: PgPool,
    /// Only used by the health check; sessions go through [`AppState::sessions`].
    pub redis: Option<ConnectionManager>,
    pub sessions: SessionService,
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::accounts::router())
        .merge(routes::sessions::router())
        .merge(routes::health::router());

    Router::new()
        .nest("/v1", api_routes)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(Arc::new(state))
}
