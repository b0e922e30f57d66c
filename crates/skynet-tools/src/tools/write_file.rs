use async_trait::async_trait;
use serde_json::{json, Value};
use skynet_core::types::SecurityLevel;

use crate::context::ToolContext;
use crate::registry::ToolHandler;

use super::read_file::resolve_within_workspace;

pub struct WriteFileTool;

#[async_trait]
impl ToolHandler for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write (overwrite) a file inside the session workspace, creating parent directories as needed."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path relative to the workspace root." },
                "content": { "type": "string" }
            },
            "required": ["path", "content"]
        })
    }

    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::Write
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, String> {
        let rel = args.get("path").and_then(|v| v.as_str()).ok_or("missing required parameter: path")?;
        let content = args.get("content").and_then(|v| v.as_str()).ok_or("missing required parameter: content")?;
        let path = resolve_within_workspace(&ctx.workspace_path, rel)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("failed to create parent directories: {e}"))?;
        }
        std::fs::write(&path, content).map_err(|e| format!("failed to write '{rel}': {e}"))?;

        Ok(json!({ "bytes_written": content.len() }))
    }
}
