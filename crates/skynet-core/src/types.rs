use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies which agent instance handles a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// The default single-agent setup uses "main".
    pub fn main() -> Self {
        Self("main".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-connection identifier (random UUID, not persisted).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(pub String);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generate a fresh time-sortable identifier (UUIDv7), used for session ids,
/// run ids, and anything else that benefits from sorting alongside log
/// timestamps.
pub fn new_sortable_id() -> String {
    Uuid::now_v7().to_string()
}

/// Generate a fresh random identifier (UUIDv4), used for connection- and
/// request-scoped values that are never persisted.
pub fn new_random_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------
// Conversation / transcript data model
// ---------------------------------------------------------------------

/// The role a `Message` plays within a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    ToolResultCarrier,
}

/// `{id, name, arguments}` — a single tool invocation requested by the LLM
/// within one assistant message. `id` is unique within that message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// `{tool_call_id, tool_name, success, data | error}` — at most one per
/// `tool_call_id`, produced by the Tool Executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, tool_name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(tool_call_id: impl Into<String>, tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// A timestamped turn in a conversation.
///
/// Invariant: every `ToolCall` produced in iteration N is matched 1:1 by a
/// `ToolResult` with equal `tool_call_id` in the next appended carrier
/// message — see `skynet-agent`'s loop for how this is maintained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
    /// Monotonic wall-clock timestamp (ms since epoch).
    pub timestamp_ms: i64,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            tool_calls: None,
            tool_results: None,
            timestamp_ms: now_ms(),
        }
    }

    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
            tool_results: None,
            timestamp_ms: now_ms(),
        }
    }

    pub fn tool_result_carrier(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::ToolResultCarrier,
            text: String::new(),
            tool_calls: None,
            tool_results: Some(results),
            timestamp_ms: now_ms(),
        }
    }
}

// ---------------------------------------------------------------------
// Session identity
// ---------------------------------------------------------------------

/// Chat surface shape for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    Direct,
    Group,
}

/// Stable identity of a conversation, derived from `(channel_id,
/// conversation_id)` where `conversation_id` is the group id for group
/// chats or the sender id for direct chats.
///
/// Unlike the user-centric keying this workspace's ancestor used, this key
/// never spans channels: the same human talking on two channels gets two
/// independent sessions, keyed by channel rather than by sender alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub channel: String,
    pub conversation_id: String,
}

impl SessionKey {
    pub fn new(channel: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            conversation_id: conversation_id.into(),
        }
    }

    /// Canonical wire-format string: `channel:<channel>:conv:<conversation_id>`.
    pub fn format(&self) -> String {
        format!("channel:{}:conv:{}", self.channel, self.conversation_id)
    }

    /// Parse a wire-format key string back into a `SessionKey`. The
    /// conversation id may itself contain colons, so only the first two
    /// segments are treated as delimiters.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let rest = s
            .strip_prefix("channel:")
            .ok_or_else(|| format!("missing 'channel:' prefix: {s}"))?;
        let marker = ":conv:";
        let pos = rest
            .find(marker)
            .ok_or_else(|| format!("missing ':conv:' segment: {s}"))?;
        let channel = &rest[..pos];
        let conversation_id = &rest[pos + marker.len()..];
        if channel.is_empty() || conversation_id.is_empty() {
            return Err(format!("key components must not be empty: {s}"));
        }
        Ok(Self {
            channel: channel.to_string(),
            conversation_id: conversation_id.to_string(),
        })
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// One active entry per `SessionKey`. Rotation allocates a new `session_id`;
/// older transcripts remain on disk but are no longer referenced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub session_key: SessionKey,
    pub session_id: String,
    pub channel: String,
    pub chat_type: ChatType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub created_at: String,
    pub rotated_count: u32,
}

// ---------------------------------------------------------------------
// Tool registry data model
// ---------------------------------------------------------------------

/// Security tier of a tool; determines whether the Write Gate mediates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Read,
    Write,
    Sign,
}

impl SecurityLevel {
    pub fn requires_gate(&self) -> bool {
        matches!(self, SecurityLevel::Write | SecurityLevel::Sign)
    }
}

// ---------------------------------------------------------------------
// Cron data model
// ---------------------------------------------------------------------

/// Tagged schedule variant for a `CronJob`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CronSchedule {
    At { at_ms: i64 },
    Every {
        every_ms: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor_ms: Option<i64>,
    },
    Cron {
        expr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tz: Option<String>,
    },
}

/// Which loop a cron job feeds: the main conversational session, or a
/// one-off isolated agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTarget {
    Main,
    Isolated,
}

/// Whether a job completion should immediately prompt the main loop to
/// process its injected event, or wait for the next natural heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeMode {
    NextHeartbeat,
    Now,
}

/// Tagged payload variant. `target=main` jobs must carry `SystemEvent`;
/// `target=isolated` jobs must carry `AgentTurn`. Mismatches are rejected
/// at creation (`skynet-scheduler::engine::validate_job`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CronPayload {
    SystemEvent {
        text: String,
    },
    AgentTurn {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
}

/// Outcome of the most recently completed run of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Error,
    Skipped,
}

/// Mutable run state embedded in a `CronJob`.
///
/// Invariant: `enabled = false` implies `next_run_at_ms` is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<i64>,
    #[serde(default)]
    pub run_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
    pub schedule: CronSchedule,
    pub target: JobTarget,
    pub wake_mode: WakeMode,
    pub payload: CronPayload,
    #[serde(default)]
    pub delete_after_run: bool,
    #[serde(default)]
    pub state: JobState,
}

impl CronJob {
    /// `payload` must match `target`: `main` carries
    /// `SystemEvent`, `isolated` carries `AgentTurn`.
    pub fn validate_payload(&self) -> std::result::Result<(), String> {
        match (self.target, &self.payload) {
            (JobTarget::Main, CronPayload::SystemEvent { .. }) => Ok(()),
            (JobTarget::Isolated, CronPayload::AgentTurn { .. }) => Ok(()),
            (target, _) => Err(format!("payload does not match target {target:?}")),
        }
    }
}

/// Lifecycle/outcome action recorded for a single job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAction {
    Started,
    Finished,
    Removed,
}

/// `{job_id, action, status, ts_ms, duration_ms?, summary?, error?}` —
/// append-only per job, kept as a bounded ring (last K entries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_id: String,
    pub action: RunAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    pub ts_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------
// Operational tables
// ---------------------------------------------------------------------

/// `{key, request_hash, response_cache?, expires_at}`. Keys take the form
/// `msg:<channel>:<message_id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub request_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_cache: Option<String>,
    pub expires_at: i64,
}

/// `{bucket, window_start_ms, count}` — sliding-window counter keyed by
/// `user:<channel>:<sender>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCounter {
    pub bucket: String,
    pub window_start_ms: i64,
    pub count: u32,
}
