//! Application-wide constants and defaults
//!
//! Centralizes the tunable numbers so config defaults and tests agree.

use std::time::Duration;

/// Upstream fetch retry defaults
pub mod retry {
    use super::*;

    /// Total attempts per upstream call (first try included)
    pub const MAX_RETRIES: u32 = 5;

    /// Delay before the second attempt
    pub const BASE_DELAY: Duration = Duration::from_millis(1500);

    /// Multiplier applied per attempt
    pub const BACKOFF_FACTOR: f64 = 1.8;

    /// Additive jitter per attempt (scaled by attempt number)
    pub const JITTER: Duration = Duration::from_millis(200);
}

/// Market data defaults
pub mod market {
    /// Whole-market snapshot TTL (seconds)
    pub const SNAPSHOT_TTL_SECS: u64 = 10;

    /// Max candidates returned on fuzzy name matches
    pub const TOP_N_CANDIDATES: usize = 10;

    /// Trading days of daily bars returned by default
    pub const HISTORY_DAYS: usize = 60;

    /// Rows requested per page of the whole-market list
    pub const SNAPSHOT_PAGE_SIZE: usize = 100;

    pub const EASTMONEY_LIST_URL: &str = "https://82.push2.eastmoney.com/api/qt/clist/get";
    pub const EASTMONEY_KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
}

/// Conversation defaults
pub mod chat {
    /// Model rounds before a run is cut off
    pub const MAX_ROUNDS: u32 = 5;

    pub const TEMPERATURE: f32 = 0.2;

    /// Final answer when the round budget runs out
    pub const BUDGET_EXHAUSTED_ANSWER: &str = "(tool call budget exhausted, stopped)";

    /// Buffered events between a run and its consumer
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;
}

/// Model endpoint defaults
pub mod llm {
    pub const BASE_URL: &str = "https://api.deepseek.com";
    pub const MODEL: &str = "deepseek-chat";
    pub const REASONING_MODEL: &str = "deepseek-reasoner";

    /// Concurrent model streams across all runs
    pub const MAX_CONCURRENT: usize = 8;
}

/// Remote tool endpoint defaults
pub mod tools {
    use super::*;

    pub const MCP_URL: &str = "https://data-api.investoday.net/data/mcp/preset";
    pub const MCP_TIMEOUT: Duration = Duration::from_secs(60);
}
