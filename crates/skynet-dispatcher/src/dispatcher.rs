use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use skynet_channels::{ChannelManager, MsgContext, OutboundMessage, PreFilterOutcome};
use skynet_core::types::{now_ms, ChatType, Message, SessionKey};
use skynet_hooks::{HookContext, HookEngine, HookEvent};
use skynet_persistence::{InfraDb, TranscriptStore};
use skynet_sessions::{SessionManager, SessionMetadata};
use skynet_tools::{ToolContext, ToolExecutor, ToolRegistry};
use tracing::{info, warn};

use crate::activation::ActivationPolicy;
use crate::infra::{idempotency_key, rate_bucket, request_hash, RateLimitConfig};
use crate::slash::{handle_slash_command, ModelState, StatusContext};

/// Per-message entry point: activation filter, dedup,
/// rate-limit, slash commands, session resolution, the Agentic Loop, and
/// the reply/event-record tail.
pub struct Dispatcher {
    pub infra: Arc<InfraDb>,
    pub sessions: Arc<SessionManager>,
    pub transcripts: Arc<TranscriptStore>,
    pub tools: Arc<ToolRegistry>,
    pub executor: Arc<ToolExecutor>,
    pub provider: Arc<dyn skynet_agent::LlmProvider>,
    pub channels: Arc<ChannelManager>,
    pub hooks: Arc<HookEngine>,
    pub activation: ActivationPolicy,
    pub model: Arc<ModelState>,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub workspace_path: PathBuf,
    pub rate_limit: RateLimitConfig,
    pub idempotency_ttl_ms: i64,
    /// Set once after the Cron Engine is constructed (it needs a live
    /// `Dispatcher` as its `MainLoopHooks`, so the handle can't be passed at
    /// construction time). `/status` reads through this to report cron
    /// stats; absent, it just omits that section of the reply.
    pub scheduler: std::sync::OnceLock<skynet_scheduler::SchedulerHandle>,
}

impl Dispatcher {
    /// Record the scheduler handle once the Cron Engine has been built.
    /// A no-op if already set.
    pub fn set_scheduler(&self, handle: skynet_scheduler::SchedulerHandle) {
        let _ = self.scheduler.set(handle);
    }

    /// The full single-message pipeline. Never panics; every failure past
    /// step 4 is converted into a user-visible warning reply rather than
    /// propagating; partial progress already persisted is left in place.
    pub async fn handle_message(&self, msg: MsgContext) {
        let started_at = now_ms();

        // Step 0 (pre_filter): give the Write Gate first look via the channel's
        // own pre_filter hook before this function is even invoked — enforced
        // by channel adapters registering the hook; nothing to do here beyond
        // documenting the contract.

        // Step 1: activation filter.
        if !self.activation.is_activated(&msg) {
            return;
        }

        // Step 2: idempotency.
        let key = idempotency_key(&msg.channel, &msg.message_id);
        let hash = request_hash(&msg.channel, &msg.message_id, &msg.body);
        match self.infra.try_claim_idempotency(&key, &hash, started_at, self.idempotency_ttl_ms) {
            Ok(true) => {}
            Ok(false) => {
                info!(channel = %msg.channel, message_id = %msg.message_id, "duplicate message, skipping");
                return;
            }
            Err(e) => {
                warn!(error = %e, "idempotency check failed, processing anyway");
            }
        }

        // Step 3: rate limit.
        let bucket = rate_bucket(&msg.channel, &msg.from);
        match self.infra.bump_rate(&bucket, started_at, self.rate_limit.window_ms) {
            Ok(count) if count > self.rate_limit.cap => {
                self.reply(&msg, "\u{26a0}\u{fe0f} You're sending messages too quickly. Please slow down.").await;
                return;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "rate limit check failed, processing anyway"),
        }

        let session_key = SessionKey::new(&msg.channel, conversation_id(&msg));

        // Step 4: built-in commands.
        if msg.body.trim_start().starts_with('/') {
            let status_ctx = StatusContext {
                infra: &self.infra,
                executor: &self.executor,
                scheduler: self.scheduler.get(),
                rate_limit: &self.rate_limit,
                channel: &msg.channel,
                sender: &msg.from,
            };
            if let Some(reply) =
                handle_slash_command(&msg.body, &session_key, &self.sessions, &self.model, &status_ctx).await
            {
                self.reply(&msg, &reply).await;
                return;
            }
        }

        // Step 5: session resolution.
        let metadata = SessionMetadata {
            chat_type: msg.chat_type,
            group_id: msg.group_id.clone(),
            display_name: msg.sender_name.clone(),
        };
        let entry = match self.sessions.get_or_create(&session_key, metadata).await {
            Ok(e) => e,
            Err(e) => {
                self.reply(&msg, &format!("\u{26a0}\u{fe0f} could not resolve a session: {e}")).await;
                return;
            }
        };

        // Step 6: append user turn.
        let user_message = Message::user(msg.body.clone());
        if let Err(e) = self.transcripts.append(&entry.session_id, &user_message).await {
            self.reply(&msg, &format!("\u{26a0}\u{fe0f} could not persist your message: {e}")).await;
            return;
        }

        // Step 7: provider preflight.
        if !self.provider.has_credentials() {
            self.reply(
                &msg,
                "\u{26a0}\u{fe0f} No LLM provider is configured with usable credentials. \
                 Ask an operator to set one up before messaging again.",
            )
            .await;
            return;
        }

        // Step 8: Agentic Loop.
        let history = match self.transcripts.read(&entry.session_id, None).await {
            Ok(h) => h,
            Err(e) => {
                self.reply(&msg, &format!("\u{26a0}\u{fe0f} could not load conversation history: {e}")).await;
                return;
            }
        };

        let tool_ctx = ToolContext::new(session_key.clone(), "main", msg.channel.clone(), self.workspace_path.clone())
            .with_config(json!({}));

        let outcome = skynet_agent::run_turn(
            self.provider.as_ref(),
            &self.transcripts,
            &entry.session_id,
            &self.system_prompt,
            &self.model.get(),
            self.max_tokens,
            history,
            &self.tools,
            &self.executor,
            &tool_ctx,
        )
        .await;

        let (final_text, status) = match outcome {
            Ok(text) => (text, "ok"),
            Err(e) => (format!("\u{26a0}\u{fe0f} something went wrong: {e}"), "error"),
        };

        // Step 9: append assistant turn, send reply.
        let assistant_message = Message::assistant(final_text.clone(), Vec::new());
        if let Err(e) = self.transcripts.append(&entry.session_id, &assistant_message).await {
            warn!(error = %e, session_id = %entry.session_id, "failed to persist assistant turn");
        }
        self.reply(&msg, &final_text).await;

        // Step 10: event record.
        let duration_ms = now_ms() - started_at;
        let payload = json!({
            "channel": msg.channel,
            "session_id": entry.session_id,
            "duration_ms": duration_ms,
            "status": status,
        });
        if let Err(e) = self.infra.record_event(
            "message.processed",
            status,
            "dispatcher",
            &msg.message_id,
            &payload.to_string(),
            now_ms(),
            now_ms() + 7 * 24 * 60 * 60 * 1000,
        ) {
            warn!(error = %e, "failed to record message.processed event");
        }
        self.hooks.emit_after(HookContext::new(HookEvent::DispatchProcessed, payload));
    }

    async fn reply(&self, msg: &MsgContext, text: &str) {
        let Some(channel) = self.channels.get(&msg.channel) else {
            warn!(channel = %msg.channel, "cannot reply: channel not registered");
            return;
        };
        let outbound = OutboundMessage::reply(text, msg.message_id.clone());
        if let Err(e) = channel.send(&msg.from, outbound).await {
            warn!(error = %e, channel = %msg.channel, "failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use skynet_agent::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
    use skynet_channels::channel::{Channel, MessageHandler, PreFilterHook};
    use skynet_channels::error::ChannelError;
    use skynet_channels::types::ChannelStatus;
    use skynet_core::types::ToolCall;
    use skynet_persistence::{InfraDb, SessionStore, TranscriptStore};
    use skynet_sessions::SessionManager;
    use skynet_tools::tools::EchoTool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    /// Records every `send` so assertions can inspect exactly what the
    /// Dispatcher replied with (S1 "Channel receives exactly one `send`").
    struct RecordingChannel {
        sent: AsyncMutex<Vec<(String, OutboundMessage)>>,
    }

    impl RecordingChannel {
        fn new() -> Self {
            Self { sent: AsyncMutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn id(&self) -> &str {
            "loopback"
        }
        async fn start(&self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn send(&self, target: &str, msg: OutboundMessage) -> Result<(), ChannelError> {
            self.sent.lock().await.push((target.to_string(), msg));
            Ok(())
        }
        fn on_message(&self, _handler: Arc<dyn MessageHandler>) {}
        fn pre_filter(&self, _hook: Arc<dyn PreFilterHook>) {}
        fn status(&self) -> ChannelStatus {
            ChannelStatus::Connected
        }
    }

    /// A scripted provider: on the first call it returns one `echo` tool
    /// call, on the second it returns the final text with no tool calls.
    struct ScriptedEchoProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for ScriptedEchoProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn has_credentials(&self) -> bool {
            true
        }
        async fn send(&self, req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let base = ChatResponse {
                content: String::new(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "end_turn".to_string(),
                tool_calls: Vec::new(),
            };
            if n == 0 {
                Ok(ChatResponse {
                    tool_calls: vec![ToolCall {
                        id: "1".to_string(),
                        name: "echo".to_string(),
                        arguments: json!({ "text": "hello" }),
                    }],
                    ..base
                })
            } else {
                Ok(ChatResponse { content: "echoed: hello".to_string(), ..base })
            }
        }
    }

    struct NeverCalledProvider;

    #[async_trait]
    impl LlmProvider for NeverCalledProvider {
        fn name(&self) -> &str {
            "never-called"
        }
        fn has_credentials(&self) -> bool {
            true
        }
        async fn send(&self, _req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            panic!("LLM must not be called for this scenario");
        }
    }

    /// Replies immediately with no tool calls — used where the scenario
    /// needs the Agentic Loop to run but the exact reply text is
    /// irrelevant.
    struct NoOpProvider;

    #[async_trait]
    impl LlmProvider for NoOpProvider {
        fn name(&self) -> &str {
            "no-op"
        }
        fn has_credentials(&self) -> bool {
            true
        }
        async fn send(&self, req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "end_turn".to_string(),
                tool_calls: Vec::new(),
            })
        }
    }

    fn test_msg(message_id: &str, body: &str) -> MsgContext {
        MsgContext {
            channel: "loopback".to_string(),
            from: "u1".to_string(),
            sender_name: None,
            chat_type: ChatType::Direct,
            group_id: None,
            message_id: message_id.to_string(),
            body: body.to_string(),
            timestamp_ms: now_ms(),
        }
    }

    fn build_dispatcher(provider: Arc<dyn skynet_agent::LlmProvider>, tmp: &tempfile::TempDir) -> (Arc<Dispatcher>, Arc<RecordingChannel>) {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let registry = Arc::new(registry);
        let executor = Arc::new(ToolExecutor::new(registry.clone(), None));

        let mut channels = ChannelManager::new();
        let channel = Arc::new(RecordingChannel::new());
        channels.register(channel.clone());
        let channels = Arc::new(channels);

        let dispatcher = Arc::new(Dispatcher {
            infra: Arc::new(InfraDb::open_in_memory().unwrap()),
            sessions: Arc::new(SessionManager::load(SessionStore::new(tmp.path().join("sessions"))).unwrap()),
            transcripts: Arc::new(TranscriptStore::new(tmp.path().join("transcripts"))),
            tools: registry,
            executor,
            provider,
            channels,
            hooks: Arc::new(HookEngine::new()),
            activation: ActivationPolicy::default(),
            model: Arc::new(ModelState::new("test-model")),
            system_prompt: "you are a test assistant".to_string(),
            max_tokens: 512,
            workspace_path: tmp.path().to_path_buf(),
            rate_limit: RateLimitConfig { window_ms: 1000, cap: 2 },
            idempotency_ttl_ms: 60_000,
            scheduler: std::sync::OnceLock::new(),
        });
        (dispatcher, channel)
    }

    /// S1. Echo round-trip.
    #[tokio::test]
    async fn s1_echo_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedEchoProvider { calls: AtomicUsize::new(0) });
        let (dispatcher, channel) = build_dispatcher(provider, &tmp);

        dispatcher.handle_message(test_msg("m1", "hello")).await;

        let sent = channel.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "u1");
        assert_eq!(sent[0].1.text, "echoed: hello");
        assert_eq!(sent[0].1.reply_to_id.as_deref(), Some("m1"));

        let key = SessionKey::new("loopback", "u1");
        let entry = dispatcher.sessions.get(&key).expect("session created");
        let transcript = dispatcher.transcripts.read(&entry.session_id, None).await.unwrap();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0].role, skynet_core::types::Role::User);
        assert_eq!(transcript[1].tool_calls.as_ref().unwrap().len(), 1);
        let carrier = &transcript[2];
        let results = carrier.tool_results.as_ref().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tool_call_id, "1");
        assert!(results[0].success);
        assert_eq!(transcript[3].text, "echoed: hello");
    }

    /// S2. Duplicate suppression.
    #[tokio::test]
    async fn s2_duplicate_message_is_suppressed() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedEchoProvider { calls: AtomicUsize::new(0) });
        let (dispatcher, channel) = build_dispatcher(provider, &tmp);

        dispatcher.handle_message(test_msg("m1", "hello")).await;
        dispatcher.handle_message(test_msg("m1", "hello")).await;

        let sent = channel.sent.lock().await;
        assert_eq!(sent.len(), 1, "duplicate delivery must not produce a second reply");

        let key = SessionKey::new("loopback", "u1");
        let entry = dispatcher.sessions.get(&key).unwrap();
        let transcript = dispatcher.transcripts.read(&entry.session_id, None).await.unwrap();
        assert_eq!(transcript.len(), 4, "duplicate delivery must not append a second user turn");
    }

    /// S3. Rate limit breach.
    #[tokio::test]
    async fn s3_rate_limit_breach_warns_without_calling_llm() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(NoOpProvider);
        let (dispatcher, channel) = build_dispatcher(provider, &tmp);

        dispatcher.handle_message(test_msg("m1", "one")).await;
        dispatcher.handle_message(test_msg("m2", "two")).await;
        dispatcher.handle_message(test_msg("m3", "three")).await;

        let sent = channel.sent.lock().await;
        assert_eq!(sent.len(), 3);
        assert!(sent[2].1.text.contains("too quickly"), "third message should be the rate-limit warning, got: {}", sent[2].1.text);
    }

    #[tokio::test]
    async fn slash_new_short_circuits_before_the_llm() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(NeverCalledProvider);
        let (dispatcher, channel) = build_dispatcher(provider, &tmp);

        dispatcher.handle_message(test_msg("m1", "/new")).await;

        let sent = channel.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.text.to_lowercase().contains("new session") || sent[0].1.text.to_lowercase().contains("no active session"));
    }
}

fn conversation_id(msg: &MsgContext) -> String {
    match msg.chat_type {
        ChatType::Group => msg.group_id.clone().unwrap_or_else(|| msg.from.clone()),
        ChatType::Direct => msg.from.clone(),
    }
}

/// Registered on every channel's `pre_filter` slot alongside the Write
/// Gate — the Write Gate is expected to run first (it is registered by the
/// composition root before this no-op passthrough), but a channel without a
/// Write Gate still needs a `PreFilterHook` implementor; this type exists
/// so `Dispatcher` itself can be handed to `Channel::pre_filter` when no
/// Write Gate is wired.
pub struct NoopPreFilter;

#[async_trait]
impl skynet_channels::PreFilterHook for NoopPreFilter {
    async fn try_consume(&self, _msg: &MsgContext) -> PreFilterOutcome {
        PreFilterOutcome::PassThrough
    }
}

/// Registered on every channel's `on_message` slot; forwards straight into
/// the pipeline.
pub struct DispatcherMessageHandler {
    pub dispatcher: Arc<Dispatcher>,
}

#[async_trait]
impl skynet_channels::MessageHandler for DispatcherMessageHandler {
    async fn handle(&self, msg: MsgContext) {
        self.dispatcher.handle_message(msg).await;
    }
}

#[async_trait]
impl skynet_scheduler::MainLoopHooks for Dispatcher {
    /// The Cron Engine's side-door: inject a synthetic
    /// user turn on a dedicated `"system"` channel and drive it through the
    /// same pipeline as a real message.
    async fn enqueue_system_event(&self, text: &str, agent_id: Option<&str>) {
        let msg = MsgContext {
            channel: "system".to_string(),
            from: agent_id.unwrap_or("main").to_string(),
            sender_name: None,
            chat_type: ChatType::Direct,
            group_id: None,
            message_id: format!("cron-{}", now_ms()),
            body: text.to_string(),
            timestamp_ms: now_ms(),
        };
        self.handle_message(msg).await;
    }

    /// `enqueue_system_event` above runs the whole pipeline synchronously
    /// before returning, so there is no separate queue to wake — this is a
    /// logging point only.
    async fn request_heartbeat(&self, reason: &str) {
        info!(reason, "heartbeat requested by cron engine");
    }
}
