use skynet_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolsError {
    #[error("tool {0:?} is already registered")]
    DuplicateTool(String),
}

impl ToolsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolsError::DuplicateTool(_) => ErrorKind::ValidationError,
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolsError>;
