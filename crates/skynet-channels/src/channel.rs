use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::ChannelError,
    types::{ChannelStatus, MsgContext, OutboundMessage, PreFilterOutcome},
};

/// Callback invoked for every inbound message a channel accepts via
/// `on_message(handler)`. Registered once per adapter, typically by the
/// Dispatcher at startup.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: MsgContext);
}

/// The Write Gate's short-circuit hook, registered via `pre_filter(hook)`.
/// A channel offers every inbound message to the hook
/// before the normal `on_message` handler sees it; a `Consumed` outcome
/// means the Dispatcher must not receive the message.
#[async_trait]
pub trait PreFilterHook: Send + Sync {
    async fn try_consume(&self, msg: &MsgContext) -> PreFilterOutcome;
}

/// Common interface implemented by every channel adapter.
///
/// The core never sees a concrete chat-platform wire protocol — only this
/// capability set. Implementations must be `Send + Sync` so they can be
/// stored in a [`crate::manager::ChannelManager`] and driven from multiple
/// Tokio tasks.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"discord"`).
    fn id(&self) -> &str;

    /// Establish the connection to the external service (or, for
    /// in-process adapters, simply mark ready).
    async fn start(&self) -> Result<(), ChannelError>;

    /// Gracefully close the connection.
    async fn stop(&self) -> Result<(), ChannelError>;

    /// Deliver a single outbound message to `target` (an opaque
    /// channel-specific recipient identifier — a chat id, a user id, …).
    async fn send(&self, target: &str, msg: OutboundMessage) -> Result<(), ChannelError>;

    /// Register the handler that receives every inbound message this
    /// channel is offered (after the `pre_filter` hook has passed it
    /// through). Replaces any previously registered handler.
    fn on_message(&self, handler: Arc<dyn MessageHandler>);

    /// Register the Write Gate's short-circuit hook. Replaces any
    /// previously registered hook.
    fn pre_filter(&self, hook: Arc<dyn PreFilterHook>);

    /// Return the current runtime status without blocking.
    fn status(&self) -> ChannelStatus;
}
