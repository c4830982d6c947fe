//! Health check endpoint: for load balancers and container health checks.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pg_ok = banter_db::postgres::health_check(&state.pg).await;
    let redis_ok = match state.redis.clone() {
        Some(mut conn) => banter_db::redis_pool::ping(&mut conn).await,
        None => true,
    };

    if !(pg_ok && redis_ok) {
        tracing::warn!(pg_ok, redis_ok, "Health check degraded");
    }

    Json(HealthResponse {
        status: if pg_ok && redis_ok {
            "healthy"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
    })
}
