use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use skynet_channels::{ChannelManager, LoopbackChannel};
use skynet_core::config::SkynetConfig;
use skynet_dispatcher::Dispatcher;

/// Central shared state — passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: SkynetConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub channels: Arc<ChannelManager>,
    /// The in-process channel `POST /chat` drives messages through.
    pub http_channel: Arc<LoopbackChannel>,
}

/// Assemble the full Axum router. Intentionally small: concrete channel
/// adapters (Discord, Telegram, ...) carry their own ingress; this process
/// only needs a liveness probe and a loopback chat endpoint for local
/// testing and scripting.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/chat", post(crate::http::chat::chat_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
