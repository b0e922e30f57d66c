//! Agentic Loop — bounded LLM/tool round-tripping built on a
//! `ProviderRouter`/`ProviderSlot` failover chain and a `run_turn` loop.

pub mod anthropic;
pub mod error;
pub mod openai;
pub mod provider;
pub mod router;
pub mod turn;

pub use error::{AgentError, ProviderError, Result};
pub use provider::{ChatRequest, ChatResponse, LlmProvider, ToolSpec};
pub use router::{ProviderRouter, ProviderSlot};
pub use turn::{run_turn, MAX_ITERATIONS};

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiCompatProvider;
