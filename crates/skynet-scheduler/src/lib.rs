//! Durable job catalog, due-time scheduler, and main/isolated job execution.
//!
//! Jobs are persisted as a JSON catalog (`skynet_persistence::CronStore`)
//! rather than a database table — the whole-catalog write volume is low and
//! this keeps the store crash-safe with the same write-temp-then-rename
//! idiom used for the session catalog. [`engine::SchedulerEngine`] drives a
//! single cooperative ticker that wakes at the next due job, clamped to
//! `[1ms, 60s]`.
//!
//! Three schedule variants (`at`, `every`, `cron`) are evaluated by
//! [`schedule::next_run_at_ms`]; `cron` expressions are parsed and
//! evaluated by the `cron` crate rather than hand-rolled.

pub mod engine;
pub mod error;
pub mod hooks;
pub mod schedule;

pub use engine::{SchedulerEngine, SchedulerHandle, DEFAULT_RUN_HISTORY_LEN};
pub use error::{Result, SchedulerError};
pub use hooks::{HeartbeatOnce, HeartbeatOutcome, IsolatedAgentRunner, IsolatedRunOutcome, MainLoopHooks};
pub use schedule::next_run_at_ms;
