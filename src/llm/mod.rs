pub mod limiter;
pub mod wire;


use async_openai::{config::OpenAIConfig, error::OpenAIError, Client};
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use tracing::info;

use crate::chat::ChatMessage;
use crate::config::LlmConfig;
use crate::error::ModelError;
use crate::tools::ToolDescriptor;

pub use limiter::ConcurrencyLimitedModel;
use wire::{ChatCompletionBody, ChunkResponse};

/// Incremental piece of a streamed model response
#[derive(Clone, Debug, PartialEq)]
pub enum ModelChunk {
    Reasoning(String),
    Content(String),
    /// Partial tool call; fragments sharing `index` belong to one call
    ToolCallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
    Usage {
        prompt_tokens: u64,
        completion_tokens: u64,
    },
}

pub type ModelStream = BoxStream<'static, Result<ModelChunk, ModelError>>;

pub struct ModelRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolDescriptor],
    pub thinking: bool,
}

/// Chat-completion endpoint that proposes tool calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identity used for a request with the given thinking mode
    fn model_name(&self, thinking: bool) -> String;

    /// Starts one streamed completion. The stream owns everything it needs.
    async fn stream(&self, request: ModelRequest<'_>) -> Result<ModelStream, ModelError>;
}

/// OpenAI-compatible client (DeepSeek by default)
#[derive(Clone)]
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model: String,
    reasoning_model: String,
    temperature: f32,
}

impl LlmClient {
    pub fn new(api_key: String, config: &LlmConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(config.base_url.clone());
        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            reasoning_model: config.reasoning_model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    fn model_name(&self, thinking: bool) -> String {
        if thinking {
            self.reasoning_model.clone()
        } else {
            self.model.clone()
        }
    }

    async fn stream(&self, request: ModelRequest<'_>) -> Result<ModelStream, ModelError> {
        let model = self.model_name(request.thinking);
        let body = ChatCompletionBody::build(&model, &request, self.temperature);

        info!(
            "[LLM] Streaming completion (model: {}, messages: {}, tools: {})",
            model,
            request.messages.len(),
            request.tools.len()
        );

        let raw: Pin<Box<dyn Stream<Item = Result<ChunkResponse, OpenAIError>> + Send>> =
            self.client.chat().create_stream_byot(body).await?;

        Ok(raw
            .flat_map(|item| {
                let chunks: Vec<Result<ModelChunk, ModelError>> = match item {
                    Ok(chunk) => chunk.into_model_chunks().into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(ModelError::Stream(e.to_string()))],
                };
                stream::iter(chunks)
            })
            .boxed())
    }
}
