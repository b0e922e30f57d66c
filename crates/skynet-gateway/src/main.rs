use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use skynet_agent::{AnthropicProvider, LlmProvider, OpenAiCompatProvider, ProviderRouter, ProviderSlot};
use skynet_channels::{ChannelManager, LoopbackChannel};
use skynet_core::config::{ProvidersConfig, SkynetConfig};
use skynet_dispatcher::{ActivationPolicy, Dispatcher, DispatcherMessageHandler, ModelState, RateLimitConfig};
use skynet_hooks::HookEngine;
use skynet_persistence::{InfraDb, SessionStore, TranscriptStore};
use skynet_scheduler::SchedulerEngine;
use skynet_sessions::SessionManager;
use skynet_tools::{ToolExecutor, ToolRegistry};
use skynet_writegate::WriteGate;

mod app;
mod http;

const MAX_TOOL_RETRIES: u32 = 2;
const DEFAULT_MAX_TOKENS: u32 = 4096;
const SYSTEM_PROMPT: &str = "You are a helpful conversational agent with access to a small set of tools.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skynet_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("SKYNET_CONFIG").ok();
    let config = skynet_core::config::SkynetConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        SkynetConfig::default()
    });

    let db_root = PathBuf::from(&config.database.path);
    std::fs::create_dir_all(&db_root)?;

    // ── Persistence ──────────────────────────────────────────────────────
    let sessions_store = SessionStore::new(db_root.join("sessions"));
    let sessions = Arc::new(SessionManager::load(sessions_store)?);
    let transcripts = Arc::new(TranscriptStore::new(db_root.join("transcripts")));
    let infra_conn = rusqlite::Connection::open(db_root.join("infra.db"))?;
    let infra = Arc::new(InfraDb::new(infra_conn)?);

    // ── Capability surface ───────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    let http_channel = Arc::new(LoopbackChannel::new("http"));
    channels.register(http_channel.clone());
    let channels = Arc::new(channels);

    // ── Write Gate / Tool Registry ───────────────────────────────────────
    let write_gate = Arc::new(WriteGate::new(channels.clone()));
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(skynet_tools::tools::EchoTool))?;
    registry.register(Arc::new(skynet_tools::tools::ReadFileTool))?;
    registry.register(Arc::new(skynet_tools::tools::WriteFileTool))?;
    registry.register(Arc::new(skynet_tools::tools::TransferTool))?;
    let tools = Arc::new(registry);
    let executor = Arc::new(ToolExecutor::new(tools.clone(), Some(write_gate.clone())));

    // ── LLM provider failover ────────────────────────────────────────────
    let provider: Arc<dyn LlmProvider> = Arc::new(build_provider_router(&config.providers));

    // ── Hooks ────────────────────────────────────────────────────────────
    let hooks = Arc::new(HookEngine::new());

    let dispatcher = Arc::new(Dispatcher {
        infra: infra.clone(),
        sessions: sessions.clone(),
        transcripts: transcripts.clone(),
        tools: tools.clone(),
        executor: executor.clone(),
        provider,
        channels: channels.clone(),
        hooks: hooks.clone(),
        activation: ActivationPolicy::default(),
        model: Arc::new(ModelState::new(config.agent.model.clone())),
        system_prompt: SYSTEM_PROMPT.to_string(),
        max_tokens: DEFAULT_MAX_TOKENS,
        workspace_path: db_root.join("workspace"),
        rate_limit: RateLimitConfig {
            window_ms: config.dispatch.rate_window_ms,
            cap: config.dispatch.rate_max,
        },
        idempotency_ttl_ms: config.dispatch.idempotency_ttl_ms,
        scheduler: std::sync::OnceLock::new(),
    });

    http_channel.pre_filter(write_gate.clone());
    http_channel.on_message(Arc::new(DispatcherMessageHandler { dispatcher: dispatcher.clone() }));
    http_channel.start().await?;

    // ── Cron Engine ──────────────────────────────────────────────────────
    let scheduler = SchedulerEngine::new(db_root.join("cron"), hooks.clone(), dispatcher.clone(), None, None)?;
    let scheduler = scheduler.into_handle();
    dispatcher.set_scheduler(scheduler.clone());
    let _scheduler_task = scheduler.spawn_loop();

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = Arc::new(app::AppState { config, dispatcher, channels, http_channel });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("Skynet gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Builds the failover chain from configured provider slots.
/// With nothing configured, falls back to a single credential-less
/// Anthropic slot so the Dispatcher's preflight check fails cleanly with a
/// user-visible hint instead of the process refusing to start.
fn build_provider_router(cfg: &ProvidersConfig) -> ProviderRouter {
    let mut slots = Vec::new();

    if let Some(anthropic) = &cfg.anthropic {
        let provider = AnthropicProvider::new(Some(anthropic.api_key.clone()), Some(anthropic.base_url.clone()));
        slots.push(ProviderSlot::new(Box::new(provider), MAX_TOOL_RETRIES));
    }
    if let Some(openai) = &cfg.openai {
        let provider = OpenAiCompatProvider::new(Some(openai.api_key.clone()), Some(openai.base_url.clone()));
        slots.push(ProviderSlot::new(Box::new(provider), MAX_TOOL_RETRIES));
    }
    if slots.is_empty() {
        slots.push(ProviderSlot::new(Box::new(AnthropicProvider::new(None, None)), MAX_TOOL_RETRIES));
    }

    ProviderRouter::new(slots)
}
