use async_trait::async_trait;
use serde_json::{json, Value};
use skynet_core::types::SecurityLevel;

use crate::context::ToolContext;
use crate::registry::ToolHandler;

/// Maximum characters returned, to avoid flooding the context window.
const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct ReadFileTool;

#[async_trait]
impl ToolHandler for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file inside the session workspace. Optionally limit to a \
         line range with `offset` (1-based first line) and `limit` (number of lines)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path relative to the workspace root." },
                "offset": { "type": "integer", "description": "1-based line number to start from (optional)." },
                "limit": { "type": "integer", "description": "Maximum number of lines to return (optional)." }
            },
            "required": ["path"]
        })
    }

    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::Read
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, String> {
        let rel = args.get("path").and_then(|v| v.as_str()).ok_or("missing required parameter: path")?;
        let path = resolve_within_workspace(&ctx.workspace_path, rel)?;

        let content = std::fs::read_to_string(&path).map_err(|e| format!("failed to read '{rel}': {e}"))?;

        let offset = args.get("offset").and_then(|v| v.as_u64()).map(|v| v.saturating_sub(1) as usize);
        let limit = args.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        let result = if offset.is_some() || limit.is_some() {
            let start = offset.unwrap_or(0);
            let lines: Vec<&str> = content.lines().skip(start).collect();
            let lines = if let Some(n) = limit { &lines[..n.min(lines.len())] } else { &lines[..] };
            lines.join("\n")
        } else {
            content
        };

        let result = if result.len() > MAX_OUTPUT_CHARS {
            format!("{}\n\n[output truncated at {} characters]", &result[..MAX_OUTPUT_CHARS], MAX_OUTPUT_CHARS)
        } else {
            result
        };

        Ok(json!({ "content": result }))
    }
}

/// Join `rel` onto `root` and reject anything that escapes it via `..` or
/// an absolute path — tools only ever see the session's own workspace.
pub(crate) fn resolve_within_workspace(root: &std::path::Path, rel: &str) -> Result<std::path::PathBuf, String> {
    let candidate = std::path::Path::new(rel);
    if candidate.is_absolute() || candidate.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(format!("path '{rel}' escapes the workspace"));
    }
    Ok(root.join(candidate))
}
