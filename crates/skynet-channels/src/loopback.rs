use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    channel::{Channel, MessageHandler, PreFilterHook},
    error::ChannelError,
    types::{ChannelStatus, MsgContext, OutboundMessage, PreFilterOutcome},
};

/// In-process channel adapter with no real transport. Exercises the
/// Dispatcher and Write Gate end-to-end in tests and local demos without a
/// platform SDK — concrete adapters live outside this crate, but the
/// core still needs *something* to drive.
///
/// `deliver` simulates an inbound message arriving on the wire: it first
/// offers the message to the registered `pre_filter` hook (matching the
/// Write Gate's short-circuit protocol) and, if not consumed, forwards it
/// to the registered `on_message` handler. `sent()` returns everything
/// `send` has recorded, in order, for test assertions.
pub struct LoopbackChannel {
    id: String,
    status: RwLock<ChannelStatus>,
    handler: RwLock<Option<Arc<dyn MessageHandler>>>,
    filter: RwLock<Option<Arc<dyn PreFilterHook>>>,
    sent: Mutex<Vec<(String, OutboundMessage)>>,
}

impl LoopbackChannel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: RwLock::new(ChannelStatus::Disconnected),
            handler: RwLock::new(None),
            filter: RwLock::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Simulate an inbound message. Returns `true` if it reached the
    /// `on_message` handler, `false` if the pre-filter consumed it.
    pub async fn deliver(&self, msg: MsgContext) -> bool {
        if let Some(hook) = self.filter.read().unwrap().clone() {
            if matches!(hook.try_consume(&msg).await, PreFilterOutcome::Consumed) {
                debug!(channel = %self.id, message_id = %msg.message_id, "message consumed by pre-filter");
                return false;
            }
        }
        if let Some(handler) = self.handler.read().unwrap().clone() {
            handler.handle(msg).await;
            true
        } else {
            false
        }
    }

    /// Every outbound message recorded by `send`, in call order, as
    /// `(target, message)` pairs.
    pub fn sent(&self) -> Vec<(String, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Channel for LoopbackChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn start(&self) -> Result<(), ChannelError> {
        *self.status.write().unwrap() = ChannelStatus::Connected;
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        *self.status.write().unwrap() = ChannelStatus::Disconnected;
        Ok(())
    }

    async fn send(&self, target: &str, msg: OutboundMessage) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((target.to_string(), msg));
        Ok(())
    }

    fn on_message(&self, handler: Arc<dyn MessageHandler>) {
        *self.handler.write().unwrap() = Some(handler);
    }

    fn pre_filter(&self, hook: Arc<dyn PreFilterHook>) {
        *self.filter.write().unwrap() = Some(hook);
    }

    fn status(&self) -> ChannelStatus {
        self.status.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skynet_core::types::ChatType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle(&self, _msg: MsgContext) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NeverConsume;

    #[async_trait]
    impl PreFilterHook for NeverConsume {
        async fn try_consume(&self, _msg: &MsgContext) -> PreFilterOutcome {
            PreFilterOutcome::PassThrough
        }
    }

    struct AlwaysConsume;

    #[async_trait]
    impl PreFilterHook for AlwaysConsume {
        async fn try_consume(&self, _msg: &MsgContext) -> PreFilterOutcome {
            PreFilterOutcome::Consumed
        }
    }

    fn msg() -> MsgContext {
        MsgContext {
            channel: "loopback".to_string(),
            from: "u1".to_string(),
            sender_name: None,
            chat_type: ChatType::Direct,
            group_id: None,
            message_id: "m1".to_string(),
            body: "hi".to_string(),
            timestamp_ms: 0,
        }
    }

    #[tokio::test]
    async fn passthrough_reaches_handler() {
        let ch = LoopbackChannel::new("loopback");
        let count = Arc::new(AtomicUsize::new(0));
        ch.on_message(Arc::new(CountingHandler(count.clone())));
        ch.pre_filter(Arc::new(NeverConsume));

        let delivered = ch.deliver(msg()).await;
        assert!(delivered);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn consumed_never_reaches_handler() {
        let ch = LoopbackChannel::new("loopback");
        let count = Arc::new(AtomicUsize::new(0));
        ch.on_message(Arc::new(CountingHandler(count.clone())));
        ch.pre_filter(Arc::new(AlwaysConsume));

        let delivered = ch.deliver(msg()).await;
        assert!(!delivered);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn send_is_recorded() {
        let ch = LoopbackChannel::new("loopback");
        ch.send("u1", OutboundMessage::reply("hello", "m1")).await.unwrap();
        let sent = ch.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "u1");
        assert_eq!(sent[0].1.text, "hello");
    }
}
