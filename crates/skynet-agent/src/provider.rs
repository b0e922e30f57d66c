use async_trait::async_trait;
use skynet_core::types::Message;

use crate::error::ProviderError;

/// Tool definition sent to the LLM API — shape mirrors
/// `skynet_tools::ToolDefinition` but stays provider-agnostic so this crate
/// does not need the tool registry to describe a request.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Request to an LLM provider: system prompt plus the full conversation
/// (transcript history and the current user turn) and the tool registry
/// snapshot.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub tools: Vec<ToolSpec>,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
    pub tool_calls: Vec<skynet_core::types::ToolCall>,
}

/// Common interface for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name, used for logging and as the `providers` priority key.
    fn name(&self) -> &str;

    /// Whether this provider is configured with usable credentials. The
    /// The Dispatcher's provider-preflight step checks this
    /// before entering the Agentic Loop.
    fn has_credentials(&self) -> bool;

    /// Send a request and wait for the full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}
