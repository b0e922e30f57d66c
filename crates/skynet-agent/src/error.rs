use skynet_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("no API key configured")]
    NoApiKey,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Http(_) | ProviderError::Unavailable(_) | ProviderError::RateLimited { .. } => {
                ErrorKind::TransientIo
            }
            ProviderError::Api { .. } | ProviderError::Parse(_) => ErrorKind::TransientIo,
            ProviderError::NoApiKey | ProviderError::Unauthorized(_) => ErrorKind::ConfigMissing,
        }
    }

    /// Network/5xx/rate-limit errors advance to the next provider slot
    /// rather than aborting the loop.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Http(_) | ProviderError::Unavailable(_) | ProviderError::RateLimited { .. }
        ) || matches!(self, ProviderError::Api { status, .. } if *status >= 500)
    }

    /// `no_api_key`/`unauthorized` — on the primary provider these short-circuit
    /// the router entirely rather than falling through.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ProviderError::NoApiKey | ProviderError::Unauthorized(_))
            || matches!(self, ProviderError::Api { status, .. } if *status == 401 || *status == 403)
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Persist(#[from] skynet_persistence::PersistError),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Provider(e) => e.kind(),
            AgentError::Persist(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
