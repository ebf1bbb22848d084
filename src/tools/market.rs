use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::MarketDataConfig;
use crate::data::{Adjust, MarketData};
use crate::error::ToolError;

use super::{ToolDescriptor, ToolGateway};

pub const RESOLVE_SYMBOL: &str = "resolve_symbol";
pub const GET_REALTIME_QUOTE: &str = "get_realtime_quote";
pub const GET_DAILY_HISTORY: &str = "get_daily_history";
pub const GET_FUNDAMENTALS: &str = "get_fundamentals";

/// In-process tools over the market data layer.
#[derive(Clone)]
pub struct MarketTools {
    data: MarketData,
    top_n: usize,
    history_days: usize,
}

impl MarketTools {
    pub fn new(data: MarketData, config: &MarketDataConfig) -> Self {
        Self {
            data,
            top_n: config.top_n,
            history_days: config.history_days,
        }
    }

    pub fn descriptors() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: RESOLVE_SYMBOL.to_string(),
                description: "Find A-share stocks by 6-digit code or by (partial) name. \
                              Multiple matches are ranked by traded value; the first is the default pick."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "6-digit code or name fragment" },
                        "top_n": { "type": "integer", "minimum": 1, "description": "Max candidates to return" }
                    },
                    "required": ["query"]
                }),
            },
            ToolDescriptor {
                name: GET_REALTIME_QUOTE.to_string(),
                description: "Latest price, percent change, turnover rate and traded value for one stock."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "code": { "type": "string", "description": "6-digit stock code" }
                    },
                    "required": ["code"]
                }),
            },
            ToolDescriptor {
                name: GET_DAILY_HISTORY.to_string(),
                description: "Recent daily bars (open, close, high, low, volume, traded value) for one stock."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "code": { "type": "string", "description": "6-digit stock code" },
                        "days": { "type": "integer", "minimum": 1, "description": "Trading days to return" },
                        "adjust": { "type": "string", "enum": ["qfq", "hfq", "none"] }
                    },
                    "required": ["code"]
                }),
            },
            ToolDescriptor {
                name: GET_FUNDAMENTALS.to_string(),
                description: "Valuation for one stock: dynamic PE, PB and total market cap (CNY)."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "code": { "type": "string", "description": "6-digit stock code" }
                    },
                    "required": ["code"]
                }),
            },
        ]
    }
}

fn required_str<'a>(tool: &str, args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("missing string field '{}'", key),
        })
}

fn optional_usize(tool: &str, args: &Value, key: &str) -> Result<Option<usize>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .map(|n| Some(n as usize))
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: tool.to_string(),
                reason: format!("'{}' must be a non-negative integer", key),
            }),
    }
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Malformed(e.to_string()))
}

#[async_trait]
impl ToolGateway for MarketTools {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(Self::descriptors())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        match name {
            RESOLVE_SYMBOL => {
                let query = required_str(name, &arguments, "query")?;
                let top_n = optional_usize(name, &arguments, "top_n")?.unwrap_or(self.top_n);
                let resolution = self.data.resolve(query, top_n).await?;
                to_payload(&resolution)
            }
            GET_REALTIME_QUOTE => {
                let code = required_str(name, &arguments, "code")?;
                let quote = self.data.realtime_quote(code).await?;
                to_payload(&quote)
            }
            GET_FUNDAMENTALS => {
                let code = required_str(name, &arguments, "code")?;
                let fundamentals = self.data.fundamentals(code).await?;
                to_payload(&fundamentals)
            }
            GET_DAILY_HISTORY => {
                let code = required_str(name, &arguments, "code")?;
                let days = optional_usize(name, &arguments, "days")?.unwrap_or(self.history_days);
                let adjust = match arguments.get("adjust").and_then(Value::as_str) {
                    None => Adjust::default(),
                    Some(s) => Adjust::parse(s).ok_or_else(|| ToolError::InvalidArguments {
                        tool: name.to_string(),
                        reason: format!("unknown adjust '{}'", s),
                    })?,
                };
                let bars = self.data.daily_history(code, days, adjust).await?;
                Ok(json!({
                    "code": code.trim(),
                    "adjust": adjust,
                    "bars": to_payload(&bars)?,
                }))
            }
            other => Err(ToolError::UnknownTool {
                name: other.to_string(),
            }),
        }
    }
}
