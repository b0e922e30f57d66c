use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18789;
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Top-level config (skynet.toml + SKYNET_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkynetConfig {
    pub gateway: GatewayConfig,
    pub agent: AgentConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub write_gate: WriteGateConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for SkynetConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            gateway: GatewayConfig {
                port: DEFAULT_PORT,
                bind: DEFAULT_BIND.to_string(),
                auth: AuthConfig {
                    mode: AuthMode::Token,
                    token: Some("change-me".to_string()),
                },
            },
            agent: AgentConfig {
                model: "claude-sonnet-4-6".to_string(),
            },
            providers: ProvidersConfig::default(),
            dispatch: DispatchConfig::default(),
            write_gate: WriteGateConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    Token,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Root directory for the persisted state layout:
    /// `<path>/sessions/`, `<path>/cron/`, `<path>/infra.db`.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Dispatcher-level knobs: idempotency TTL and the sliding rate-limit
/// window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_idempotency_ttl_ms")]
    pub idempotency_ttl_ms: i64,
    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: i64,
    #[serde(default = "default_rate_max")]
    pub rate_max: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            idempotency_ttl_ms: default_idempotency_ttl_ms(),
            rate_window_ms: default_rate_window_ms(),
            rate_max: default_rate_max(),
        }
    }
}

/// Write Gate default confirmation deadline (120 s).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteGateConfig {
    #[serde(default = "default_write_gate_deadline_ms")]
    pub default_deadline_ms: i64,
}

impl Default for WriteGateConfig {
    fn default() -> Self {
        Self {
            default_deadline_ms: default_write_gate_deadline_ms(),
        }
    }
}

/// Cron Engine tick bounds (ticker wakes at
/// `min(next_run_at_ms) - now`, clamped to `[1ms, 60s]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_max_tick_ms")]
    pub max_tick_ms: i64,
    #[serde(default = "default_stuck_job_ms")]
    pub stuck_job_ms: i64,
    #[serde(default = "default_run_history_len")]
    pub run_history_len: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_tick_ms: default_max_tick_ms(),
            stuck_job_ms: default_stuck_job_ms(),
            run_history_len: default_run_history_len(),
        }
    }
}

fn default_idempotency_ttl_ms() -> i64 {
    5 * 60 * 1000
}
fn default_rate_window_ms() -> i64 {
    60_000
}
fn default_rate_max() -> u32 {
    20
}
fn default_write_gate_deadline_ms() -> i64 {
    120_000
}
fn default_max_tick_ms() -> i64 {
    60_000
}
fn default_stuck_job_ms() -> i64 {
    2 * 60 * 60 * 1000
}
fn default_run_history_len() -> usize {
    50
}

/// Ordered list of LLM provider slots tried by `skynet-agent`'s failover
/// router. Concrete provider wiring is illustrative only —
/// concrete LLM clients are an external collaborator, not implemented here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.skynet/state", home)
}

impl SkynetConfig {
    /// Load config from a TOML file with SKYNET_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.skynet/skynet.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: SkynetConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SKYNET_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.skynet/skynet.toml", home)
}
