use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use skynet_core::types::SecurityLevel;

use crate::context::ToolContext;
use crate::error::{Result, ToolsError};

/// Advertised shape of a tool, as sent to the LLM provider and used by the
/// Executor to look up the handler.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub security_level: SecurityLevel,
}

/// A runnable tool. Implementors never need to worry about write-gating —
/// the Executor applies the policy before `execute` is called for anything
/// above `SecurityLevel::Read`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    fn security_level(&self) -> SecurityLevel;

    /// Run the tool. Any internal failure is returned as `Err(message)` —
    /// the Executor turns it into a failed `ToolResult`, never a panic or a
    /// propagated error.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> std::result::Result<Value, String>;
}

/// Name-keyed catalog of tools, shared read-only once built.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolsError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
                security_level: t.security_level(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
