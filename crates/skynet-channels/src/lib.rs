pub mod channel;
pub mod error;
pub mod loopback;
pub mod manager;
pub mod types;

pub use channel::{Channel, MessageHandler, PreFilterHook};
pub use error::ChannelError;
pub use loopback::LoopbackChannel;
pub use manager::ChannelManager;
pub use types::{ChannelStatus, MsgContext, OutboundMessage, PreFilterOutcome};
