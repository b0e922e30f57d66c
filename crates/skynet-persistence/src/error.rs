use skynet_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The session or cron store is malformed — this is fatal at startup,
    /// there is no automatic migration.
    #[error("corrupt store at {path}: {reason}")]
    CorruptStore { path: String, reason: String },
}

impl PersistError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PersistError::Io(_) => ErrorKind::PermanentIo,
            PersistError::Serialization(_) => ErrorKind::ValidationError,
            PersistError::Database(_) => ErrorKind::PermanentIo,
            PersistError::CorruptStore { .. } => ErrorKind::ConfigMissing,
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
