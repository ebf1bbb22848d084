//! Tool descriptors, calls and results, and the gateway that executes them.

pub mod market;
pub mod mcp;

#[cfg(test)]
mod market_tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ToolError;

pub use market::MarketTools;
pub use mcp::McpGateway;

/// Callable capability offered to the model
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON-Schema object describing the arguments
    pub parameters: Value,
}

/// A call proposed by the model. `arguments` is the raw JSON text the model emitted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    /// Arguments as a JSON object; blank text means no arguments.
    pub fn arguments_object(&self) -> Result<Value, ToolError> {
        let raw = self.arguments.trim();
        if raw.is_empty() {
            return Ok(json!({}));
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(v @ Value::Object(_)) => Ok(v),
            Ok(other) => Err(ToolError::InvalidArguments {
                tool: self.name.clone(),
                reason: format!("expected a JSON object, got {}", other),
            }),
            Err(e) => Err(ToolError::InvalidArguments {
                tool: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Outcome of one executed call. Never mutated once created.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub success: bool,
    pub payload: Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(call: &ToolCall, payload: Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            success: true,
            payload,
            error: None,
        }
    }

    pub fn failed(call: &ToolCall, error: &ToolError) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            success: false,
            payload: Value::Null,
            error: Some(error.to_string()),
        }
    }

    /// Text fed back to the model as the `tool` message content.
    pub fn to_content(&self) -> String {
        if self.success {
            self.payload.to_string()
        } else {
            json!({ "error": self.error.clone().unwrap_or_default() }).to_string()
        }
    }
}

/// Lists and executes tools.
///
/// `call_tool` may fail; `invoke` folds every failure into an unsuccessful
/// `ToolResult` so a bad call never aborts a conversation.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError>;

    async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let arguments = match call.arguments_object() {
            Ok(a) => a,
            Err(e) => {
                warn!("[TOOLS] {} ({}) not dispatched: {}", call.name, call.id, e);
                return ToolResult::failed(call, &e);
            }
        };

        match self.call_tool(&call.name, arguments).await {
            Ok(payload) => {
                info!("[TOOLS] {} ({}) succeeded", call.name, call.id);
                ToolResult::ok(call, payload)
            }
            Err(e) => {
                warn!("[TOOLS] {} ({}) failed: {}", call.name, call.id, e);
                ToolResult::failed(call, &e)
            }
        }
    }
}
