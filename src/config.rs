use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::constants;
use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Used instead of `model` when the caller enables thinking
    pub reasoning_model: String,
    pub temperature: f32,
    pub max_concurrent: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: constants::llm::BASE_URL.to_string(),
            model: constants::llm::MODEL.to_string(),
            reasoning_model: constants::llm::REASONING_MODEL.to_string(),
            temperature: constants::chat::TEMPERATURE,
            max_concurrent: constants::llm::MAX_CONCURRENT,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::retry::MAX_RETRIES,
            base_delay_ms: constants::retry::BASE_DELAY.as_millis() as u64,
            backoff_factor: constants::retry::BACKOFF_FACTOR,
            jitter_ms: constants::retry::JITTER.as_millis() as u64,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub snapshot_ttl_secs: u64,
    pub top_n: usize,
    pub history_days: usize,
    pub page_size: usize,
    pub list_url: String,
    pub kline_url: String,
    pub retry: RetryConfig,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl_secs: constants::market::SNAPSHOT_TTL_SECS,
            top_n: constants::market::TOP_N_CANDIDATES,
            history_days: constants::market::HISTORY_DAYS,
            page_size: constants::market::SNAPSHOT_PAGE_SIZE,
            list_url: constants::market::EASTMONEY_LIST_URL.to_string(),
            kline_url: constants::market::EASTMONEY_KLINE_URL.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolBackend {
    /// Remote JSON-RPC tool server
    #[default]
    Mcp,
    /// In-process tools over the market data layer
    Market,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub backend: ToolBackend,
    pub mcp_url: String,
    pub mcp_api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            backend: ToolBackend::default(),
            mcp_url: constants::tools::MCP_URL.to_string(),
            mcp_api_key: None,
            timeout_secs: constants::tools::MCP_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub max_rounds: u32,
    /// Thinking mode when a request does not say
    pub thinking_default: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_rounds: constants::chat::MAX_ROUNDS,
            thinking_default: true,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub market_data: MarketDataConfig,
    pub tools: ToolsConfig,
    pub chat: ChatConfig,
}

impl AppConfig {
    /// Loads `CONFIG_PATH` (or `config.yaml`), then applies environment overrides.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // Strip BOM if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Secrets and endpoint overrides from the environment win over the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = non_empty("DEEPSEEK_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = non_empty("DEEPSEEK_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = non_empty("DEEPSEEK_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = non_empty("STOCK_MCP_API_KEY") {
            self.tools.mcp_api_key = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market_data.retry.max_retries == 0 {
            return Err(ConfigError::Invalid {
                key: "market_data.retry.max_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.market_data.retry.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid {
                key: "market_data.retry.backoff_factor",
                reason: format!("{} is below 1.0", self.market_data.retry.backoff_factor),
            });
        }
        if self.market_data.top_n == 0 {
            return Err(ConfigError::Invalid {
                key: "market_data.top_n",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.chat.max_rounds == 0 {
            return Err(ConfigError::Invalid {
                key: "chat.max_rounds",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.llm.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                key: "llm.max_concurrent",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The model key is the one secret the server cannot start without.
    pub fn llm_api_key(&self) -> Result<&str, ConfigError> {
        self.llm
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("DEEPSEEK_API_KEY"))
    }
}
