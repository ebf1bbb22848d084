//! Stock Copilot - Tool-augmented A-share market assistant
//!
//! This library provides a streaming chat endpoint backed by a reasoning
//! language model that calls market-data tools, including symbol resolution
//! over a cached exchange snapshot and resilient upstream fetching.

pub mod api;
pub mod chat;
pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod tools;

// Re-export commonly used types
pub use chat::{ChatEvent, ConversationOrchestrator, EventStreamEncoder, FinishReason, Outcome, Stats};
pub use config::AppConfig;
pub use data::{MarketData, Resolution, SymbolResolver};
pub use tools::{ToolCall, ToolGateway, ToolResult};
