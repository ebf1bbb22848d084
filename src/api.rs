use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info};

use crate::chat::{ConversationOrchestrator, EventStreamEncoder};
use crate::config::AppConfig;
use crate::data::MarketData;

pub struct AppState {
    pub orchestrator: ConversationOrchestrator,
    pub market: MarketData,
    pub config: AppConfig,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
    pub thinking: Option<bool>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat/endpoint", post(chat_stream))
        .route("/chat/endpoint-sync", post(chat_sync))
        .route("/cache/invalidate", post(invalidate_cache))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn run_server(state: Arc<AppState>) -> std::io::Result<()> {
    let addr = state.config.server.bind_addr.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("[API] Server listening on {}", addr);
    axum::serve(listener, app).await
}

fn empty_prompt() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "prompt must not be empty"})),
    )
        .into_response()
}

/// Streams the run as `event:`/`data:` blocks until the terminal `end`.
async fn chat_stream(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    let prompt = req.prompt.trim().to_string();
    if prompt.is_empty() {
        return empty_prompt();
    }
    let thinking = req.thinking.unwrap_or(state.config.chat.thinking_default);
    info!("[API] Streaming chat request (thinking: {})", thinking);

    let rx = state.orchestrator.stream(prompt, thinking);
    let body = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok::<_, Infallible>(EventStreamEncoder::encode(&event)), rx))
    });

    (
        [
            (header::CONTENT_TYPE, EventStreamEncoder::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

async fn chat_sync(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    let prompt = req.prompt.trim().to_string();
    if prompt.is_empty() {
        return empty_prompt();
    }
    let thinking = req.thinking.unwrap_or(state.config.chat.thinking_default);

    match state.orchestrator.run(&prompt, thinking).await {
        Ok(outcome) => Json(json!({
            "success": true,
            "result": outcome.answer,
            "finish_reason": outcome.finish_reason,
            "stats": outcome.stats,
        }))
        .into_response(),
        Err(e) => {
            error!("[API] Chat failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn invalidate_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.market.invalidate_snapshot().await;
    Json(json!({"status": "invalidated"}))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}
