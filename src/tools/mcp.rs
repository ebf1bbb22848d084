use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::config::ToolsConfig;
use crate::error::{ConfigError, ToolError};

use super::{ToolDescriptor, ToolGateway};

/// JSON-RPC gateway to a remote tool server (`tools/list`, `tools/call`).
#[derive(Clone)]
pub struct McpGateway {
    client: Client,
    endpoint: Url,
}

impl McpGateway {
    pub fn new(url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, ConfigError> {
        let mut endpoint = Url::parse(url).map_err(|e| ConfigError::Invalid {
            key: "tools.mcp_url",
            reason: e.to_string(),
        })?;
        if let Some(key) = api_key {
            endpoint.query_pairs_mut().append_pair("apiKey", key);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "tools",
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &ToolsConfig) -> Result<Self, ConfigError> {
        Self::new(
            &config.mcp_url,
            config.mcp_api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });

        debug!("[MCP] -> {}", method);
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = resp.json().await?;

        rpc_result(body)
    }
}

/// Splits a JSON-RPC response into its result or an application-level error.
pub fn rpc_result(body: Value) -> Result<Value, ToolError> {
    if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
        return Err(ToolError::Remote {
            message: error_message(err),
        });
    }
    Ok(body.get("result").cloned().unwrap_or(Value::Null))
}

fn error_message(err: &Value) -> String {
    match err {
        Value::String(s) => s.clone(),
        Value::Object(o) => o
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string()),
        other => other.to_string(),
    }
}

/// Maps a `tools/list` result to descriptors.
pub fn parse_tool_list(result: &Value) -> Result<Vec<ToolDescriptor>, ToolError> {
    let tools = result
        .get("tools")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::Malformed("tools/list result has no tools array".to_string()))?;

    Ok(tools
        .iter()
        .filter_map(|t| {
            let name = t.get("name")?.as_str()?.to_string();
            Some(ToolDescriptor {
                name,
                description: t
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                parameters: t
                    .get("inputSchema")
                    .filter(|s| s.is_object())
                    .cloned()
                    .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
            })
        })
        .collect())
}

/// A `tools/call` result flagged `isError` is an application-level failure.
pub fn check_call_result(result: Value) -> Result<Value, ToolError> {
    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        let message = result
            .get("content")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "tool reported an error".to_string());
        return Err(ToolError::Remote { message });
    }
    Ok(result)
}

#[async_trait]
impl ToolGateway for McpGateway {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let result = self.rpc("tools/list", json!({})).await?;
        let tools = parse_tool_list(&result)?;
        info!("[MCP] {} tools available", tools.len());
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let result = self
            .rpc("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        check_call_result(result)
    }
}
