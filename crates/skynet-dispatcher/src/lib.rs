//! Dispatcher — the channel-agnostic pipeline that turns an
//! inbound `MsgContext` into idempotency/rate-limit checks, slash-command
//! handling, session resolution, an Agentic Loop turn, and a reply, while
//! also standing in as the Cron Engine's `MainLoopHooks` side-door.

pub mod activation;
pub mod dispatcher;
pub mod error;
pub mod infra;
pub mod slash;

pub use activation::ActivationPolicy;
pub use dispatcher::{Dispatcher, DispatcherMessageHandler, NoopPreFilter};
pub use error::{DispatcherError, Result};
pub use infra::{idempotency_key, rate_bucket, request_hash, RateLimitConfig, IDEMPOTENCY_TTL_MS};
pub use slash::{handle_slash_command, ModelState};
