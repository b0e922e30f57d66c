//! Built-in slash commands, intercepted before the Agentic Loop and
//! short-circuiting it on a match: `/new`, `/status`, `/model`.

use std::sync::RwLock;

use skynet_core::types::{now_ms, SessionKey};
use skynet_persistence::InfraDb;
use skynet_sessions::SessionManager;
use skynet_tools::ToolExecutor;
use tracing::info;

use crate::infra::{rate_bucket, RateLimitConfig};

/// Shared, mutable "current model" the `/model` command reads and writes.
/// Wrapped in a plain `RwLock` — reads/writes are rare compared to the
/// per-message hot path.
pub struct ModelState(RwLock<String>);

impl ModelState {
    pub fn new(initial: impl Into<String>) -> Self {
        Self(RwLock::new(initial.into()))
    }

    pub fn get(&self) -> String {
        self.0.read().expect("model state poisoned").clone()
    }

    pub fn set(&self, model: impl Into<String>) -> String {
        let mut guard = self.0.write().expect("model state poisoned");
        std::mem::replace(&mut *guard, model.into())
    }
}

/// Everything `/status` needs to report beyond session metadata, borrowed
/// for the duration of a single call rather than threaded through the
/// Dispatcher's whole message pipeline.
pub struct StatusContext<'a> {
    pub infra: &'a InfraDb,
    pub executor: &'a ToolExecutor,
    pub scheduler: Option<&'a skynet_scheduler::SchedulerHandle>,
    pub rate_limit: &'a RateLimitConfig,
    pub channel: &'a str,
    pub sender: &'a str,
}

/// Returns `Some(reply)` if `body` was a recognized command, `None` if it
/// should be forwarded to the Agentic Loop.
pub async fn handle_slash_command(
    body: &str,
    session_key: &SessionKey,
    sessions: &SessionManager,
    model: &ModelState,
    status: &StatusContext<'_>,
) -> Option<String> {
    let trimmed = body.trim();

    if trimmed.eq_ignore_ascii_case("/new") {
        return Some(match sessions.rotate(session_key).await {
            Ok(Some(entry)) => {
                info!(session = %session_key, rotated_count = entry.rotated_count, "session reset via /new");
                "Started a new session. Previous history is preserved on disk but no longer active.".to_string()
            }
            Ok(None) => "No active session to reset yet — just say something first.".to_string(),
            Err(e) => format!("\u{26a0}\u{fe0f} failed to reset session: {e}"),
        });
    }

    if trimmed.eq_ignore_ascii_case("/status") {
        let session_line = match sessions.get(session_key) {
            Some(entry) => format!(
                "Session `{}` — channel `{}`, rotated {} time(s), created {}",
                entry.session_id, entry.channel, entry.rotated_count, entry.created_at
            ),
            None => "No active session yet.".to_string(),
        };

        let bucket = rate_bucket(status.channel, status.sender);
        let rate_line = match status.infra.peek_rate(&bucket, now_ms(), status.rate_limit.window_ms) {
            Ok(count) => format!("Rate limit: {count}/{} this window", status.rate_limit.cap),
            Err(e) => format!("Rate limit: unavailable ({e})"),
        };

        let pending = status.executor.pending_confirmations(status.channel, status.sender).await;
        let pending_line = format!("Pending confirmations: {pending}");

        let cron_line = match status.scheduler {
            Some(handle) => {
                let jobs = handle.list_jobs().await;
                let enabled = jobs.iter().filter(|j| j.enabled).count();
                format!("Cron: {enabled}/{} job(s) enabled", jobs.len())
            }
            None => "Cron: not running".to_string(),
        };

        return Some(format!("{session_line}\n{rate_line}\n{pending_line}\n{cron_line}"));
    }

    if trimmed.eq_ignore_ascii_case("/model") {
        return Some(format!("Current model: `{}`", model.get()));
    }

    if let Some(arg) = trimmed.strip_prefix("/model ") {
        let arg = arg.trim();
        if arg.is_empty() {
            return Some("Usage: `/model <name>`".to_string());
        }
        let previous = model.set(arg);
        info!(previous = %previous, new = %arg, "model switched via /model command");
        return Some(format!("Model switched: `{previous}` -> `{arg}`"));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use skynet_persistence::SessionStore;
    use skynet_tools::ToolRegistry;
    use std::sync::Arc;

    fn default_status_ctx(infra: &InfraDb, executor: &ToolExecutor, rate_limit: &RateLimitConfig) -> StatusContext<'_> {
        StatusContext { infra, executor, scheduler: None, rate_limit, channel: "loopback", sender: "alice" }
    }

    #[tokio::test]
    async fn model_round_trips_through_get_and_set() {
        let state = ModelState::new("claude-sonnet-4-6");
        assert_eq!(state.get(), "claude-sonnet-4-6");
        let previous = state.set("claude-opus-4-6");
        assert_eq!(previous, "claude-sonnet-4-6");
        assert_eq!(state.get(), "claude-opus-4-6");
    }

    #[tokio::test]
    async fn unrecognized_command_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionManager::load(SessionStore::new(dir.path())).unwrap();
        let key = SessionKey::new("loopback", "alice");
        let model = ModelState::new("m");
        let infra = InfraDb::open_in_memory().unwrap();
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()), None);
        let rate_limit = RateLimitConfig::default();
        let status = default_status_ctx(&infra, &executor, &rate_limit);
        assert!(handle_slash_command("/unknown", &key, &sessions, &model, &status).await.is_none());
    }

    #[tokio::test]
    async fn status_reports_no_session_before_first_message() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionManager::load(SessionStore::new(dir.path())).unwrap();
        let key = SessionKey::new("loopback", "alice");
        let model = ModelState::new("m");
        let infra = InfraDb::open_in_memory().unwrap();
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()), None);
        let rate_limit = RateLimitConfig::default();
        let status = default_status_ctx(&infra, &executor, &rate_limit);
        let reply = handle_slash_command("/status", &key, &sessions, &model, &status).await.unwrap();
        assert!(reply.contains("No active session"));
    }

    #[tokio::test]
    async fn status_reports_rate_pending_and_cron_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionManager::load(SessionStore::new(dir.path())).unwrap();
        let key = SessionKey::new("loopback", "alice");
        let model = ModelState::new("m");
        let infra = InfraDb::open_in_memory().unwrap();
        infra.bump_rate("user:loopback:alice", now_ms(), 60_000).unwrap();
        infra.bump_rate("user:loopback:alice", now_ms(), 60_000).unwrap();
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()), None);
        let rate_limit = RateLimitConfig::default();
        let status = default_status_ctx(&infra, &executor, &rate_limit);
        let reply = handle_slash_command("/status", &key, &sessions, &model, &status).await.unwrap();
        assert!(reply.contains(&format!("Rate limit: 2/{} this window", rate_limit.cap)));
        assert!(reply.contains("Pending confirmations: 0"));
        assert!(reply.contains("Cron: not running"));
    }
}
