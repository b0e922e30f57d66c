use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use skynet_channels::channel::PreFilterHook;
use skynet_channels::manager::ChannelManager;
use skynet_channels::types::{MsgContext, OutboundMessage, PreFilterOutcome};
use skynet_core::types::{new_random_id, SessionKey};
use skynet_tools::gate::{GateDecision, WriteGatePolicy};
use tokio::sync::oneshot;
use tracing::{info, warn};

type WaiterKey = (String, String);

struct PendingConfirmation {
    token: String,
    resolver: oneshot::Sender<GateDecision>,
}

/// Mediates every `write`/`sign` tool call through a human confirmation on
/// the originating channel.
///
/// `pending` is keyed by `(channel_id, sender)`; within a key, waiters are
/// resolved strictly in FIFO order — a reply is only ever matched against
/// the head of its queue.
pub struct WriteGate {
    channels: Arc<ChannelManager>,
    pending: DashMap<WaiterKey, VecDeque<PendingConfirmation>>,
}

impl WriteGate {
    pub fn new(channels: Arc<ChannelManager>) -> Self {
        Self { channels, pending: DashMap::new() }
    }

    /// Remove a caller's own wait before it resolves naturally. Any later
    /// reply is no longer consumed and falls through to the Dispatcher as a
    /// normal message.
    pub fn cancel(&self, channel_id: &str, sender: &str, token: &str) {
        let key = (channel_id.to_string(), sender.to_string());
        if let Some(mut queue) = self.pending.get_mut(&key) {
            queue.retain(|p| p.token != token);
        }
    }

    fn remove_by_token(&self, key: &WaiterKey, token: &str) {
        if let Some(mut queue) = self.pending.get_mut(key) {
            queue.retain(|p| p.token != token);
        }
    }
}

#[async_trait]
impl WriteGatePolicy for WriteGate {
    async fn confirm(&self, session_key: &SessionKey, channel_id: &str, prompt: &str, deadline_ms: i64) -> GateDecision {
        let channel = match self.channels.get(channel_id) {
            Some(c) => c,
            None => return GateDecision::ChannelError(format!("channel {channel_id:?} is not registered")),
        };

        let token = new_random_id()[..8].to_string();
        let sender = session_key.conversation_id.clone();
        let key = (channel_id.to_string(), sender.clone());

        let text = format!("{prompt}\n\nReply \"y\"/\"yes\" to confirm, \"n\"/\"no\" to cancel, or \"{token}\".");
        if let Err(e) = channel.send(&sender, OutboundMessage::text(text)).await {
            return GateDecision::ChannelError(e.to_string());
        }

        let (tx, rx) = oneshot::channel();
        self.pending.entry(key.clone()).or_default().push_back(PendingConfirmation { token: token.clone(), resolver: tx });
        info!(channel = %channel_id, %sender, %token, "write gate confirmation pending");

        match tokio::time::timeout(Duration::from_millis(deadline_ms.max(0) as u64), rx).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) => GateDecision::Cancelled,
            Err(_) => {
                self.remove_by_token(&key, &token);
                GateDecision::TimedOut
            }
        }
    }

    async fn pending_count(&self, channel_id: &str, sender: &str) -> usize {
        let key = (channel_id.to_string(), sender.to_string());
        self.pending.get(&key).map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl PreFilterHook for WriteGate {
    async fn try_consume(&self, msg: &MsgContext) -> PreFilterOutcome {
        let key = (msg.channel.clone(), msg.from.clone());
        let text = msg.body.trim();
        let normalized = text.to_ascii_lowercase();

        let mut entry = match self.pending.get_mut(&key) {
            Some(e) => e,
            None => return PreFilterOutcome::PassThrough,
        };

        let decision = match entry.front() {
            Some(head) if normalized == "y" || normalized == "yes" || text == head.token => Some(GateDecision::Confirmed),
            Some(_) if normalized == "n" || normalized == "no" => Some(GateDecision::Denied),
            _ => None,
        };

        let Some(decision) = decision else {
            return PreFilterOutcome::PassThrough;
        };

        let waiter = entry.pop_front().expect("presence checked above");
        if entry.is_empty() {
            drop(entry);
            self.pending.remove(&key);
        }

        if waiter.resolver.send(decision).is_err() {
            warn!(channel = %msg.channel, sender = %msg.from, "write gate waiter already gone when resolving");
        }
        PreFilterOutcome::Consumed
    }
}
