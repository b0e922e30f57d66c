use async_trait::async_trait;
use skynet_core::types::SessionKey;

/// Outcome of offering a write/sign call to the Write Gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Confirmed,
    Denied,
    TimedOut,
    Cancelled,
    ChannelError(String),
}

/// The Executor's view of the Write Gate — kept as a trait here so
/// `skynet-tools` doesn't depend on `skynet-writegate` directly; the gate
/// crate implements this for the Executor to call into.
#[async_trait]
pub trait WriteGatePolicy: Send + Sync {
    async fn confirm(&self, session_key: &SessionKey, channel_id: &str, prompt: &str, deadline_ms: i64) -> GateDecision;

    /// Number of confirmations currently pending for `(channel_id, sender)`,
    /// used by the `/status` command. Policies that don't track waiters
    /// (e.g. test doubles) can rely on the default of `0`.
    async fn pending_count(&self, _channel_id: &str, _sender: &str) -> usize {
        0
    }
}
