//! Tool-augmented conversation loop.
//!
//! ```text
//! AwaitingModel -> ModelResponded -> Finished
//!                        |
//!                        +-> ExecutingTools -> AwaitingModel (next round)
//!                                          \-> RoundLimitReached
//! ```
//!
//! A round is one model call plus the tool calls it requests. Tool failures are
//! fed back to the model; only a failing model call ends the run early.

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::constants;
use crate::error::ChatError;
use crate::llm::{ChatModel, ModelChunk, ModelRequest};
use crate::prompts;
use crate::tools::{ToolDescriptor, ToolGateway};

use super::assembler::{ModelTurn, TurnAssembler};
use super::{ChatEvent, ChatMessage, ConversationState, FinishReason, Stats};

/// Result of a completed run
#[derive(Clone, Debug)]
pub struct Outcome {
    pub answer: String,
    pub finish_reason: FinishReason,
    pub stats: Stats,
    pub transcript: Vec<ChatMessage>,
}

/// Where a run's events go. The synchronous path has no consumer.
struct EventSink {
    tx: Option<mpsc::Sender<ChatEvent>>,
}

impl EventSink {
    async fn emit(&self, event: ChatEvent) -> Result<(), ChatError> {
        match &self.tx {
            Some(tx) => tx.send(event).await.map_err(|_| ChatError::Cancelled),
            None => Ok(()),
        }
    }
}

/// Drives model rounds against the tool gateway.
/// Constructed once per process; each run owns its own `ConversationState`.
#[derive(Clone)]
pub struct ConversationOrchestrator {
    model: Arc<dyn ChatModel>,
    tools: Arc<dyn ToolGateway>,
    max_rounds: u32,
    system_prompt: String,
}

impl ConversationOrchestrator {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<dyn ToolGateway>, max_rounds: u32) -> Self {
        Self {
            model,
            tools,
            max_rounds: max_rounds.max(1),
            system_prompt: prompts::SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Spawns a run and returns its events. Dropping the receiver abandons the run.
    pub fn stream(&self, prompt: String, thinking: bool) -> mpsc::Receiver<ChatEvent> {
        let (tx, rx) = mpsc::channel(constants::chat::EVENT_CHANNEL_CAPACITY);
        let this = self.clone();
        tokio::spawn(async move {
            let sink = EventSink { tx: Some(tx) };
            match this.drive(&prompt, thinking, &sink).await {
                Err(ChatError::Cancelled) => info!("[CHAT] Run abandoned by consumer"),
                Err(e) => warn!("[CHAT] Run ended with error: {}", e),
                Ok(_) => {}
            }
        });
        rx
    }

    /// Runs to completion without emitting events.
    pub async fn run(&self, prompt: &str, thinking: bool) -> Result<Outcome, ChatError> {
        self.drive(prompt, thinking, &EventSink { tx: None }).await
    }

    /// Runs to completion, sending every event to `events`.
    pub async fn run_with_events(
        &self,
        prompt: &str,
        thinking: bool,
        events: mpsc::Sender<ChatEvent>,
    ) -> Result<Outcome, ChatError> {
        self.drive(prompt, thinking, &EventSink { tx: Some(events) }).await
    }

    async fn drive(&self, prompt: &str, thinking: bool, sink: &EventSink) -> Result<Outcome, ChatError> {
        let started = Instant::now();
        let mut state = ConversationState::new(&self.system_prompt, prompt);

        sink.emit(ChatEvent::Start {
            model: self.model.model_name(thinking),
            thinking,
        })
        .await?;

        let tools = match self.tools.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                error!("[CHAT] Cannot start conversation, tool list unavailable: {}", e);
                return self.fail(ChatError::ToolsUnavailable(e), state, started, sink).await;
            }
        };
        info!("[CHAT] Conversation started with {} tools (thinking: {})", tools.len(), thinking);

        loop {
            // AwaitingModel
            state.round += 1;
            state.stats.rounds = state.round;

            let turn = match self.call_model(&mut state, &tools, thinking, started, sink).await {
                Ok(turn) => turn,
                Err(ChatError::Cancelled) => return Err(ChatError::Cancelled),
                Err(e) => {
                    error!("[CHAT] Model call failed in round {}: {}", state.round, e);
                    return self.fail(e, state, started, sink).await;
                }
            };

            // ModelResponded -> Finished
            if turn.tool_calls.is_empty() {
                state.push_final_answer(&turn.content);
                info!("[CHAT] Finished after {} round(s)", state.round);
                return self
                    .finish(turn.content, FinishReason::Stop, state, started, sink)
                    .await;
            }

            // ModelResponded -> ExecutingTools
            let calls = turn.tool_calls;
            let total = calls.len();
            state.push_tool_request(&turn.content, &turn.reasoning, calls.clone(), thinking);
            info!("[CHAT] Round {}: executing {} tool call(s)", state.round, total);

            // Emission order, one at a time: the transcript must be reproducible
            for (i, call) in calls.into_iter().enumerate() {
                sink.emit(ChatEvent::ToolCall {
                    round: state.round,
                    index: i + 1,
                    total,
                    call: call.clone(),
                })
                .await?;
                state.stats.tool_calls += 1;

                let result = self.tools.invoke(&call).await;
                if !state.push_tool_result(&result) {
                    warn!("[CHAT] Result for unknown call id {} dropped", result.tool_call_id);
                    continue;
                }
                state.stats.tool_results += 1;

                sink.emit(ChatEvent::ToolResult {
                    round: state.round,
                    index: i + 1,
                    total,
                    result,
                })
                .await?;
            }

            // ExecutingTools -> RoundLimitReached
            if state.round >= self.max_rounds {
                warn!("[CHAT] Round budget of {} exhausted", self.max_rounds);
                return self
                    .finish(
                        constants::chat::BUDGET_EXHAUSTED_ANSWER.to_string(),
                        FinishReason::Length,
                        state,
                        started,
                        sink,
                    )
                    .await;
            }
        }
    }

    /// Streams one completion, forwarding text as it arrives, and reassembles it.
    async fn call_model(
        &self,
        state: &mut ConversationState,
        tools: &[ToolDescriptor],
        thinking: bool,
        started: Instant,
        sink: &EventSink,
    ) -> Result<ModelTurn, ChatError> {
        let request = ModelRequest {
            messages: state.messages(),
            tools,
            thinking,
        };
        let mut stream = self.model.stream(request).await?;
        let mut assembler = TurnAssembler::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let event = match &chunk {
                ModelChunk::Reasoning(text) if !text.is_empty() => Some(ChatEvent::Reasoning {
                    content: text.clone(),
                }),
                ModelChunk::Content(text) if !text.is_empty() => Some(ChatEvent::Message {
                    content: text.clone(),
                }),
                _ => None,
            };
            if let Some(event) = event {
                if state.stats.first_token_ms.is_none() {
                    state.stats.first_token_ms = Some(started.elapsed().as_millis() as u64);
                }
                sink.emit(event).await?;
            }
            assembler.push(chunk);
        }

        let turn = assembler.finish();
        if let Some((prompt_tokens, completion_tokens)) = turn.usage {
            state.stats.add_usage(prompt_tokens, completion_tokens);
        }
        Ok(turn)
    }

    async fn finish(
        &self,
        answer: String,
        finish_reason: FinishReason,
        mut state: ConversationState,
        started: Instant,
        sink: &EventSink,
    ) -> Result<Outcome, ChatError> {
        state.stats.elapsed_ms = started.elapsed().as_millis() as u64;
        sink.emit(ChatEvent::End {
            finish_reason,
            stats: state.stats.clone(),
        })
        .await?;

        Ok(Outcome {
            answer,
            finish_reason,
            stats: state.stats.clone(),
            transcript: state.into_messages(),
        })
    }

    /// Reports a fatal error, closes the stream with `end`, and returns the error.
    async fn fail(
        &self,
        err: ChatError,
        mut state: ConversationState,
        started: Instant,
        sink: &EventSink,
    ) -> Result<Outcome, ChatError> {
        state.stats.elapsed_ms = started.elapsed().as_millis() as u64;
        sink.emit(ChatEvent::Error {
            message: err.to_string(),
        })
        .await?;
        sink.emit(ChatEvent::End {
            finish_reason: FinishReason::Error,
            stats: state.stats,
        })
        .await?;
        Err(err)
    }
}
