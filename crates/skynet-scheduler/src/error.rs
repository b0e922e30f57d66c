use skynet_core::error::ErrorKind;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("persistence error: {0}")]
    Persist(#[from] skynet_persistence::PersistError),

    /// A job's `payload` does not match its `target`.
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// No job with the given ID exists in the catalog.
    #[error("job not found: {id}")]
    JobNotFound { id: String },

    /// A cron expression failed to parse.
    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidCron { expr: String, reason: String },
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Persist(e) => e.kind(),
            SchedulerError::InvalidJob(_) => ErrorKind::ValidationError,
            SchedulerError::JobNotFound { .. } => ErrorKind::ValidationError,
            SchedulerError::InvalidCron { .. } => ErrorKind::ValidationError,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
