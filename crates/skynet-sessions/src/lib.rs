pub mod error;
pub mod manager;

pub use error::SessionError;
pub use manager::{SessionManager, SessionMetadata};
pub use skynet_core::types::{SessionEntry, SessionKey};
