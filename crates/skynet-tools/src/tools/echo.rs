use async_trait::async_trait;
use serde_json::{json, Value};
use skynet_core::types::SecurityLevel;

use crate::context::ToolContext;
use crate::registry::ToolHandler;

/// Trivial read-only tool: echoes its input back. Useful as a wiring smoke
/// test for the Registry/Executor pair without touching the filesystem.
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back unchanged."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" }
            },
            "required": ["text"]
        })
    }

    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::Read
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let text = args.get("text").and_then(|v| v.as_str()).ok_or("missing required parameter: text")?;
        Ok(json!({ "text": text }))
    }
}
