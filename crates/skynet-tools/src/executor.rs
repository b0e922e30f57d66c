use std::collections::HashMap;
use std::sync::Arc;

use skynet_core::types::{SecurityLevel, ToolCall, ToolResult};
use tracing::{instrument, warn};

use crate::context::ToolContext;
use crate::gate::{GateDecision, WriteGatePolicy};
use crate::registry::ToolRegistry;

/// Default time the Write Gate is allowed to wait for a confirmation before
/// a write/sign call times out.
const DEFAULT_GATE_DEADLINE_MS: i64 = 5 * 60 * 1000;

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    gate: Option<Arc<dyn WriteGatePolicy>>,
    gate_deadline_ms: i64,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, gate: Option<Arc<dyn WriteGatePolicy>>) -> Self {
        Self { registry, gate, gate_deadline_ms: DEFAULT_GATE_DEADLINE_MS }
    }

    pub fn with_gate_deadline_ms(mut self, ms: i64) -> Self {
        self.gate_deadline_ms = ms;
        self
    }

    /// Number of write/sign confirmations currently pending for
    /// `(channel_id, sender)`; `0` when no gate is configured.
    pub async fn pending_confirmations(&self, channel_id: &str, sender: &str) -> usize {
        match &self.gate {
            Some(gate) => gate.pending_count(channel_id, sender).await,
            None => 0,
        }
    }

    /// Run every call in `calls`, returning one `ToolResult` per
    /// `tool_call_id`. Independent calls run concurrently; callers that
    /// need the original order re-serialize using `calls`' own ordering
    /// before appending the tool-result carrier message.
    #[instrument(skip(self, calls, ctx))]
    pub async fn execute_calls(&self, calls: &[ToolCall], ctx: &ToolContext) -> HashMap<String, ToolResult> {
        let futures = calls.iter().map(|call| self.execute_one(call, ctx));
        let results = futures_util::future::join_all(futures).await;
        results.into_iter().map(|r| (r.tool_call_id.clone(), r)).collect()
    }

    async fn execute_one(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        let tool = match self.registry.get(&call.name) {
            Some(t) => t,
            None => return ToolResult::err(call.id.clone(), call.name.clone(), format!("unknown tool: {}", call.name)),
        };

        if let Err(reason) = validate_args(&tool.input_schema(), &call.arguments) {
            return ToolResult::err(call.id.clone(), call.name.clone(), format!("validation_error: {reason}"));
        }

        if tool.security_level().requires_gate() {
            match self.apply_gate(&tool.security_level(), call, ctx).await {
                Ok(()) => {}
                Err(result) => return result,
            }
        }

        match tool.execute(call.arguments.clone(), ctx).await {
            Ok(data) => ToolResult::ok(call.id.clone(), call.name.clone(), data),
            Err(message) => ToolResult::err(call.id.clone(), call.name.clone(), message),
        }
    }

    async fn apply_gate(&self, level: &SecurityLevel, call: &ToolCall, ctx: &ToolContext) -> std::result::Result<(), ToolResult> {
        let gate = match &self.gate {
            Some(g) => g,
            None => {
                warn!(tool = %call.name, "write gate not configured, denying by default");
                return Err(ToolResult::err(call.id.clone(), call.name.clone(), "policy_denied: write gate not configured"));
            }
        };

        let prompt = format!("Confirm {:?} call to '{}'? (y/n)", level, call.name);
        let decision = gate.confirm(&ctx.session_key, &ctx.channel, &prompt, self.gate_deadline_ms).await;
        match decision {
            GateDecision::Confirmed => Ok(()),
            GateDecision::Denied => Err(ToolResult::err(call.id.clone(), call.name.clone(), "policy_denied: user declined")),
            GateDecision::TimedOut => Err(ToolResult::err(call.id.clone(), call.name.clone(), "timeout: confirmation not received")),
            GateDecision::Cancelled => Err(ToolResult::err(call.id.clone(), call.name.clone(), "policy_denied: confirmation cancelled")),
            GateDecision::ChannelError(e) => Err(ToolResult::err(call.id.clone(), call.name.clone(), format!("transient_io: {e}"))),
        }
    }
}

fn validate_args(schema: &serde_json::Value, args: &serde_json::Value) -> std::result::Result<(), String> {
    let validator = jsonschema::validator_for(schema).map_err(|e| format!("invalid schema: {e}"))?;
    if let Err(e) = validator.validate(args) {
        return Err(format!("{}: {}", e.instance_path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ToolContext;
    use crate::registry::ToolRegistry;
    use crate::tools::{EchoTool, TransferTool};
    use skynet_core::types::SessionKey;

    struct AlwaysConfirm;
    #[async_trait::async_trait]
    impl WriteGatePolicy for AlwaysConfirm {
        async fn confirm(&self, _session_key: &SessionKey, _channel_id: &str, _prompt: &str, _deadline_ms: i64) -> GateDecision {
            GateDecision::Confirmed
        }
    }

    struct AlwaysDeny;
    #[async_trait::async_trait]
    impl WriteGatePolicy for AlwaysDeny {
        async fn confirm(&self, _session_key: &SessionKey, _channel_id: &str, _prompt: &str, _deadline_ms: i64) -> GateDecision {
            GateDecision::Denied
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(SessionKey::new("loopback", "user1"), "main", "loopback", std::env::temp_dir())
    }

    fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall { id: id.to_string(), name: name.to_string(), arguments: args }
    }

    #[tokio::test]
    async fn unknown_tool_produces_error_result() {
        let registry = Arc::new(ToolRegistry::new());
        let executor = ToolExecutor::new(registry, None);
        let results = executor.execute_calls(&[call("1", "does_not_exist", serde_json::json!({}))], &ctx()).await;
        let r = &results["1"];
        assert!(!r.success);
        assert!(r.error.as_deref().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn validation_error_is_reported() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let executor = ToolExecutor::new(Arc::new(registry), None);
        let results = executor.execute_calls(&[call("1", "echo", serde_json::json!({}))], &ctx()).await;
        let r = &results["1"];
        assert!(!r.success);
        assert!(r.error.as_deref().unwrap().starts_with("validation_error"));
    }

    #[tokio::test]
    async fn sign_tool_without_gate_is_denied_by_default() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(TransferTool)).unwrap();
        let executor = ToolExecutor::new(Arc::new(registry), None);
        let args = serde_json::json!({ "to": "alice", "amount": 10.0 });
        let results = executor.execute_calls(&[call("1", "transfer", args)], &ctx()).await;
        let r = &results["1"];
        assert!(!r.success);
        assert!(r.error.as_deref().unwrap().starts_with("policy_denied"));
    }

    #[tokio::test]
    async fn sign_tool_runs_once_gate_confirms() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(TransferTool)).unwrap();
        let executor = ToolExecutor::new(Arc::new(registry), Some(Arc::new(AlwaysConfirm)));
        let args = serde_json::json!({ "to": "alice", "amount": 10.0 });
        let results = executor.execute_calls(&[call("1", "transfer", args)], &ctx()).await;
        assert!(results["1"].success);
    }

    #[tokio::test]
    async fn sign_tool_denied_by_gate_never_executes() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(TransferTool)).unwrap();
        let executor = ToolExecutor::new(Arc::new(registry), Some(Arc::new(AlwaysDeny)));
        let args = serde_json::json!({ "to": "alice", "amount": 10.0 });
        let results = executor.execute_calls(&[call("1", "transfer", args)], &ctx()).await;
        let r = &results["1"];
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("policy_denied: user declined"));
    }

    #[tokio::test]
    async fn multiple_calls_all_get_independent_results() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let executor = ToolExecutor::new(Arc::new(registry), None);
        let calls = vec![
            call("1", "echo", serde_json::json!({ "text": "a" })),
            call("2", "echo", serde_json::json!({ "text": "b" })),
        ];
        let results = executor.execute_calls(&calls, &ctx()).await;
        assert_eq!(results.len(), 2);
        assert!(results["1"].success && results["2"].success);
    }
}
