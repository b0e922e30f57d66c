pub mod atomic;
pub mod cron_store;
pub mod error;
pub mod infra_db;
pub mod session_store;
pub mod transcript;

pub use cron_store::CronStore;
pub use error::{PersistError, Result};
pub use infra_db::InfraDb;
pub use session_store::SessionStore;
pub use transcript::TranscriptStore;
