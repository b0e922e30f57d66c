use skynet_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("persistence error: {0}")]
    Persist(#[from] skynet_persistence::PersistError),

    #[error("invalid session key: {0}")]
    InvalidKey(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Persist(e) => e.kind(),
            SessionError::InvalidKey(_) => ErrorKind::ValidationError,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
