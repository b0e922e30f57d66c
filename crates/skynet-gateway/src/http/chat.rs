//! Local-loopback chat endpoint — POST /chat
//!
//! Drives a message through the exact same Dispatcher pipeline a channel
//! adapter would (activation, idempotency, rate limit, slash commands, the
//! Agentic Loop), via the in-process `"http"` loopback channel registered
//! in `ChannelManager` at startup. No external tooling required — works
//! with plain `curl`.
//!
//! Request:  `{"message": "hello"}` (optional: `session_id`)
//! Response: `{"reply": "..."}`

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use skynet_channels::MsgContext;
use skynet_core::types::{new_random_id, ChatType};

use crate::app::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Serialize)]
pub struct ChatError {
    pub error: String,
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, Json<ChatError>)> {
    if req.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ChatError { error: "message cannot be empty".to_string() }),
        ));
    }

    let http_channel = &state.http_channel;
    let sender = req.session_id.unwrap_or_else(|| "default".to_string());
    let before = http_channel.sent().len();

    let msg = MsgContext {
        channel: "http".to_string(),
        from: sender,
        sender_name: None,
        chat_type: ChatType::Direct,
        group_id: None,
        message_id: new_random_id(),
        body: req.message,
        timestamp_ms: skynet_core::types::now_ms(),
    };

    http_channel.deliver(msg).await;

    let sent = http_channel.sent();
    let reply = sent
        .get(before..)
        .and_then(|tail| tail.first())
        .map(|(_, outbound)| outbound.text.clone())
        .unwrap_or_else(|| "(no reply was produced)".to_string());

    Ok(Json(ChatReply { reply }))
}
