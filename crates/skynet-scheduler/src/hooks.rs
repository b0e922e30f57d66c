use async_trait::async_trait;
use skynet_core::types::{CronJob, RunStatus};

/// Outcome of a single `run_heartbeat_once()` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Ok,
    Skipped { reason: String },
    Error { message: String },
}

/// Outcome of one isolated agent run, persisted into the job's `RunRecord`
/// and `state.last_*` fields.
#[derive(Debug, Clone)]
pub struct IsolatedRunOutcome {
    pub status: RunStatus,
    pub summary: Option<String>,
    pub error: Option<String>,
}

/// The Dispatcher's side-door into the main conversational loop.
///
/// `enqueue_system_event`/`request_heartbeat` are the engine's only way to
/// drive a `target=main` job's effects — unlike `HeartbeatOnce` below, this
/// capability is mandatory: a scheduler with no main loop to call into
/// cannot usefully run `target=main` jobs at all.
#[async_trait]
pub trait MainLoopHooks: Send + Sync {
    /// Inject a synthetic user turn carrying `text` and drive the Agentic
    /// Loop as if it were a real message. `agent_id` selects which agent
    /// instance receives it, when more than one exists.
    async fn enqueue_system_event(&self, text: &str, agent_id: Option<&str>);

    /// Prompt the main loop to wake up and process whatever was just
    /// enqueued. `reason` is a free-form string for logging/correlation.
    async fn request_heartbeat(&self, reason: &str);
}

/// Optional capability: synchronously force one heartbeat cycle and wait
/// for its outcome, used for `wake_mode = now` jobs. Absent when the main
/// loop offers no such hook, in which case the scheduler falls back to
/// `request_heartbeat` alone.
#[async_trait]
pub trait HeartbeatOnce: Send + Sync {
    async fn run_heartbeat_once(&self) -> HeartbeatOutcome;
}

/// Optional capability backing `target=isolated` jobs. Absent when no
/// isolated-agent runtime is wired up, in which case such jobs are always
/// skipped with `error: "isolated-not-configured"`.
#[async_trait]
pub trait IsolatedAgentRunner: Send + Sync {
    async fn run(&self, job: &CronJob, message: &str) -> IsolatedRunOutcome;
}
