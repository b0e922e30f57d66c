use skynet_core::types::Message;
use skynet_persistence::TranscriptStore;
use skynet_tools::{ToolContext, ToolExecutor, ToolRegistry};
use tracing::{info, warn};

use crate::error::{AgentError, Result};
use crate::provider::{ChatRequest, LlmProvider, ToolSpec};

/// Bounded agentic loop: at most `MAX_ITERATIONS` round trips to
/// the LLM, each optionally followed by one batch of tool calls.
pub const MAX_ITERATIONS: usize = 5;

const FALLBACK_TEXT: &str = "I apologize, but I couldn't complete your request.";

/// Run one user turn to completion against an already-loaded conversation.
///
/// `history` is the transcript loaded up to and including the just-appended
/// user message; this function appends every further message it produces
/// (assistant turns, tool-result carriers) to `transcript` *incrementally*,
/// so a crash between iterations leaves a re-entrant transcript the caller
/// can resume by replaying from the last user message.
#[allow(clippy::too_many_arguments)]
pub async fn run_turn(
    provider: &dyn LlmProvider,
    transcript: &TranscriptStore,
    session_id: &str,
    system_prompt: &str,
    model: &str,
    max_tokens: u32,
    mut history: Vec<Message>,
    tools: &ToolRegistry,
    executor: &ToolExecutor,
    ctx: &ToolContext,
) -> Result<String> {
    let tool_specs: Vec<ToolSpec> = tools
        .definitions()
        .into_iter()
        .map(|d| ToolSpec { name: d.name, description: d.description, input_schema: d.input_schema })
        .collect();

    let mut final_text: Option<String> = None;
    let mut iteration = 0usize;

    while iteration < MAX_ITERATIONS {
        iteration += 1;

        let req = ChatRequest {
            model: model.to_string(),
            system: system_prompt.to_string(),
            messages: history.clone(),
            max_tokens,
            tools: tool_specs.clone(),
        };

        let response = match provider.send(&req).await {
            Ok(r) => r,
            Err(e) if e.is_auth_failure() => {
                warn!(error = %e, "primary provider auth failure, surfacing hint and exiting loop");
                return Ok(format!(
                    "\u{26a0}\u{fe0f} The assistant is not configured with valid credentials ({e}). \
                     Ask an operator to check the provider configuration."
                ));
            }
            Err(e) => return Err(AgentError::Provider(e)),
        };

        if response.tool_calls.is_empty() {
            final_text = Some(response.content);
            break;
        }

        let assistant_msg = Message::assistant(response.content, response.tool_calls.clone());
        transcript.append(session_id, &assistant_msg).await?;
        history.push(assistant_msg);

        let results_by_id = executor.execute_calls(&response.tool_calls, ctx).await;
        let ordered_results = response
            .tool_calls
            .iter()
            .filter_map(|call| results_by_id.get(&call.id).cloned())
            .collect();

        let carrier = Message::tool_result_carrier(ordered_results);
        transcript.append(session_id, &carrier).await?;
        history.push(carrier);

        info!(iteration, "agentic loop iteration completed with tool calls");
    }

    Ok(final_text.unwrap_or_else(|| FALLBACK_TEXT.to_string()))
}
