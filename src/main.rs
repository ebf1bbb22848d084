use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stock_copilot::api::{run_server, AppState};
use stock_copilot::chat::ConversationOrchestrator;
use stock_copilot::config::{AppConfig, ToolBackend};
use stock_copilot::data::{EastmoneySource, MarketData};
use stock_copilot::llm::limiter::ConcurrencyLimitedModel;
use stock_copilot::llm::{ChatModel, LlmClient};
use stock_copilot::tools::market::MarketTools;
use stock_copilot::tools::mcp::McpGateway;
use stock_copilot::tools::ToolGateway;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    // Setup Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Stock Copilot...");

    // Load Configuration
    let config = AppConfig::load()?;
    info!(
        "Loaded Configuration (model: {}, reasoning model: {}, tools: {:?})",
        config.llm.model, config.llm.reasoning_model, config.tools.backend
    );

    // Initialize Clients
    let api_key = config.llm_api_key()?.to_string();
    info!("Using LLM endpoint: {}", config.llm.base_url);
    let client: Arc<dyn ChatModel> = Arc::new(LlmClient::new(api_key, &config.llm));
    info!(
        "📬 Limiting model calls to {} concurrent request(s)",
        config.llm.max_concurrent
    );
    let model: Arc<dyn ChatModel> = Arc::new(ConcurrencyLimitedModel::new(client, config.llm.max_concurrent));

    let source = Arc::new(EastmoneySource::new(&config.market_data)?);
    let market = MarketData::from_config(source, &config.market_data);

    let tools: Arc<dyn ToolGateway> = match config.tools.backend {
        ToolBackend::Mcp => {
            if config.tools.mcp_api_key.is_none() {
                warn!("⚠️ STOCK_MCP_API_KEY not set - the tool server may reject requests");
            }
            info!("Using MCP tool server: {}", config.tools.mcp_url);
            Arc::new(McpGateway::from_config(&config.tools)?)
        }
        ToolBackend::Market => {
            info!("Using local market tools");
            Arc::new(MarketTools::new(market.clone(), &config.market_data))
        }
    };

    let orchestrator = ConversationOrchestrator::new(model, tools, config.chat.max_rounds);

    let app_state = Arc::new(AppState {
        orchestrator,
        market,
        config,
    });

    // Start API Server
    info!("Initializing API Server...");
    run_server(app_state).await?;

    Ok(())
}
