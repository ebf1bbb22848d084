//! Custom error types for the stock copilot
//!
//! Recoverable and fatal failures are separate types so the orchestrator can
//! decide what to feed back to the model and what ends a run.

use std::sync::Arc;
use thiserror::Error;

/// Boxed cause carried by errors that wrap an arbitrary upstream failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shareable cause; one failed refill is reported to every caller that waited on it.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Failures of a single call against the market data source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Upstream data source unavailable after every retry was spent
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("{label} failed after {attempts} attempts: {source}")]
    Exhausted {
        label: String,
        attempts: u32,
        #[source]
        source: SharedError,
    },
}

/// Symbol resolution and lookup errors
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Empty query: enter a stock code or name")]
    EmptyQuery,

    #[error("No stock matches '{query}'")]
    NoMatch { query: String },

    #[error("Code {code} is not in the market snapshot")]
    UnknownCode { code: String },

    #[error("Data temporarily unavailable: {0}")]
    Fetch(#[from] FetchError),
}

/// Tool listing and execution errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Tool endpoint returned an error: {message}")]
    Remote { message: String },

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error(transparent)]
    Data(#[from] ResolveError),

    #[error("Data temporarily unavailable: {0}")]
    Fetch(#[from] FetchError),

    #[error("Malformed tool endpoint response: {0}")]
    Malformed(String),
}

/// Language model endpoint failures
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model endpoint error: {0}")]
    Endpoint(#[from] async_openai::error::OpenAIError),

    #[error("Model stream error: {0}")]
    Stream(String),

    #[error("Model concurrency limiter closed")]
    LimiterClosed,
}

/// Errors that end an orchestration run
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Tool list unavailable: {0}")]
    ToolsUnavailable(#[source] ToolError),

    #[error("Upstream model error: {0}")]
    UpstreamModel(#[from] ModelError),

    #[error("Run abandoned: event consumer went away")]
    Cancelled,
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
