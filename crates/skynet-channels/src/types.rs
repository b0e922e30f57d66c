use serde::{Deserialize, Serialize};
use skynet_core::types::ChatType;

/// Everything the Dispatcher needs about one inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgContext {
    pub channel: String,
    pub from: String,
    pub sender_name: Option<String>,
    pub chat_type: ChatType,
    pub group_id: Option<String>,
    pub message_id: String,
    pub body: String,
    pub timestamp_ms: i64,
}

/// What to send back to a channel: text plus an optional id to quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    pub reply_to_id: Option<String>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply_to_id: None,
        }
    }

    pub fn reply(text: impl Into<String>, reply_to_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply_to_id: Some(reply_to_id.into()),
        }
    }
}

/// Runtime connection state of a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Fully connected and ready to send/receive.
    Connected,
    /// Attempting to establish or re-establish the connection.
    Connecting,
    /// Cleanly disconnected (not an error condition).
    Disconnected,
    /// An unrecoverable (or pre-retry) error occurred.
    Error(String),
}

/// Outcome of offering an inbound message to the Write Gate's `pre_filter`
/// hook before it reaches the Dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreFilterOutcome {
    /// The message matched an outstanding confirmation and was consumed;
    /// the Dispatcher must not see it.
    Consumed,
    /// No match — deliver the message to the Dispatcher as usual.
    PassThrough,
}
