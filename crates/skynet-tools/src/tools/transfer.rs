use async_trait::async_trait;
use serde_json::{json, Value};
use skynet_core::types::{new_random_id, SecurityLevel};

use crate::context::ToolContext;
use crate::registry::ToolHandler;

/// Minimal wallet-style tool whose only job is to exercise the `sign` tier
/// of the Write Gate's confirmation path. It never touches a real ledger —
/// `execute` only runs once the gate has already confirmed the call, and
/// simply mints a fake transaction id.
pub struct TransferTool;

#[async_trait]
impl ToolHandler for TransferTool {
    fn name(&self) -> &str {
        "transfer"
    }

    fn description(&self) -> &str {
        "Transfer an amount to a recipient. Requires explicit user confirmation."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": { "type": "string" },
                "amount": { "type": "number", "exclusiveMinimum": 0 }
            },
            "required": ["to", "amount"]
        })
    }

    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::Sign
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let to = args.get("to").and_then(|v| v.as_str()).ok_or("missing required parameter: to")?;
        let amount = args.get("amount").and_then(|v| v.as_f64()).ok_or("missing required parameter: amount")?;
        if amount <= 0.0 {
            return Err("amount must be positive".to_string());
        }

        Ok(json!({
            "tx_id": new_random_id(),
            "to": to,
            "amount": amount,
        }))
    }
}
