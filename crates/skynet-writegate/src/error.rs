use skynet_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteGateError {
    #[error("channel {0:?} is not registered")]
    ChannelNotFound(String),
}

impl WriteGateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WriteGateError::ChannelNotFound(_) => ErrorKind::ConfigMissing,
        }
    }
}

pub type Result<T> = std::result::Result<T, WriteGateError>;
