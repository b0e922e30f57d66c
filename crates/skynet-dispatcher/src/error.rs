use skynet_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error(transparent)]
    Persist(#[from] skynet_persistence::PersistError),

    #[error(transparent)]
    Session(#[from] skynet_sessions::SessionError),

    #[error(transparent)]
    Channel(#[from] skynet_channels::ChannelError),

    #[error(transparent)]
    Agent(#[from] skynet_agent::AgentError),
}

impl DispatcherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatcherError::Persist(e) => e.kind(),
            DispatcherError::Session(e) => e.kind(),
            DispatcherError::Channel(_) => ErrorKind::TransientIo,
            DispatcherError::Agent(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatcherError>;
