use thiserror::Error;

/// Error taxonomy shared across every crate in the engine.
///
/// Each crate defines its own `thiserror` enum for its own failure modes and
/// maps each variant onto one of these kinds via a `kind()` method, the same
/// way `CoreError::kind()` does below. Callers branch on `kind()`, never on
/// the concrete error type, when deciding whether to retry, surface a user
/// hint, or abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller must bail before starting: no provider with usable
    /// credentials, malformed cron store, etc.
    ConfigMissing,
    /// Retryable at the caller's discretion: channel send failures, LLM
    /// network errors.
    TransientIo,
    /// Not retryable: transcript append on a corrupt filesystem, full disk.
    PermanentIo,
    /// Input did not satisfy a schema or invariant.
    ValidationError,
    /// The Write Gate or a tool's own guard refused.
    PolicyDenied,
    /// A deadline elapsed.
    Timeout,
    /// An LLM hallucinated a tool name.
    UnknownTool,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigMissing => "config_missing",
            ErrorKind::TransientIo => "transient_io",
            ErrorKind::PermanentIo => "permanent_io",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::PolicyDenied => "policy_denied",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UnknownTool => "unknown_tool",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Config(_) => ErrorKind::ConfigMissing,
            CoreError::Io(_) => ErrorKind::PermanentIo,
            CoreError::Serialization(_) => ErrorKind::ValidationError,
            CoreError::Internal(_) => ErrorKind::PermanentIo,
        }
    }

    /// Short code matching `ErrorKind::as_str`, kept so crates can attach it
    /// to an event record without importing `ErrorKind` separately.
    pub fn code(&self) -> &'static str {
        self.kind().as_str()
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
