use std::path::PathBuf;

use serde_json::Value;
use skynet_core::types::SessionKey;

/// Everything a tool's `execute` may read about the call it is servicing.
///
/// `config` is a read-only subset of configuration relevant to tools —
/// never secrets.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_key: SessionKey,
    pub agent_id: String,
    pub user_id: Option<String>,
    pub channel: String,
    pub workspace_path: PathBuf,
    pub config: Value,
}

impl ToolContext {
    pub fn new(session_key: SessionKey, agent_id: impl Into<String>, channel: impl Into<String>, workspace_path: impl Into<PathBuf>) -> Self {
        Self {
            session_key,
            agent_id: agent_id.into(),
            user_id: None,
            channel: channel.into(),
            workspace_path: workspace_path.into(),
            config: Value::Null,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}
