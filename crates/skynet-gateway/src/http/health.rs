use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health — liveness probe; reports channel connection status.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let channels: Vec<Value> = state
        .channels
        .statuses()
        .into_iter()
        .map(|(id, status)| json!({ "channel": id, "status": format!("{status:?}") }))
        .collect();

    Json(json!({
        "status": "ok",
        "channels": channels,
    }))
}
