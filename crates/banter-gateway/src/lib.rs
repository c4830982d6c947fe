//! # banter-gateway
//!
//! Realtime chat gateway. A client opens a websocket at `/v1/ws`, sends its session id
//! as the first text frame, and from then on exchanges `{message_type, data}` frames.
//! Chat messages are routed to every live connection of the target account.
//!
//! Connections are tracked in a process-local [`registry::ConnectionRegistry`]; there is
//! no cross-node fan-out and nothing is queued for offline accounts.

pub mod connection;
pub mod frames;
pub mod registry;

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use banter_api::sessions::SessionService;
use banter_common::config::GatewayConfig;
use futures_util::StreamExt;
use registry::ConnectionRegistry;
use std::sync::Arc;

/// Gateway state.
#[derive(Clone)]
pub struct GatewayState {
    pub sessions: SessionService,
    pub registry: Arc<ConnectionRegistry>,
    pub config: GatewayConfig,
}

impl GatewayState {
    pub fn new(sessions: SessionService, config: GatewayConfig) -> Self {
        Self {
            sessions,
            registry: Arc::new(ConnectionRegistry::new()),
            config,
        }
    }
}

/// Build the gateway WebSocket router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/ws", get(ws_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<GatewayState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (sink, stream) = socket.split();
    connection::run(stream, sink, state).await;
}
