//! Tool Registry & Executor — resolves LLM tool calls by name,
//! validates arguments against each tool's JSON Schema, routes
//! `write`/`sign` calls through the Write Gate, and turns every outcome
//! (unknown tool, bad arguments, denied, or a thrown error) into a
//! `ToolResult` rather than ever propagating a failure to the caller.

pub mod context;
pub mod error;
pub mod gate;
pub mod registry;
pub mod executor;
pub mod tools;

pub use context::ToolContext;
pub use error::{Result, ToolsError};
pub use executor::ToolExecutor;
pub use gate::{GateDecision, WriteGatePolicy};
pub use registry::{ToolDefinition, ToolHandler, ToolRegistry};
