//! Conversation state, run statistics and the events a run emits.

pub mod assembler;
pub mod encoder;
pub mod orchestrator;


use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tools::{ToolCall, ToolResult};

pub use assembler::{ModelTurn, TurnAssembler};
pub use encoder::EventStreamEncoder;
pub use orchestrator::{ConversationOrchestrator, Outcome};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    /// Assistant reasoning trace, present only when thinking is enabled
    pub reasoning_content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Set on `tool` messages; references a call of an earlier assistant message
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            reasoning_content: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Some(content.into()))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Some(content.into()))
    }

    pub fn tool(result: &ToolResult) -> Self {
        Self {
            tool_call_id: Some(result.tool_call_id.clone()),
            ..Self::new(Role::Tool, Some(result.to_content()))
        }
    }
}

/// Terminal classification of a run
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// The model answered without requesting tools
    Stop,
    /// Round budget exhausted
    Length,
    /// Fatal failure, reported by a preceding `error` event
    Error,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Run start to first reasoning or text fragment
    pub first_token_ms: Option<u64>,
    pub elapsed_ms: u64,
    pub rounds: u32,
    pub tool_calls: u32,
    pub tool_results: u32,
}

impl Stats {
    pub fn add_usage(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
        self.total_tokens = self.prompt_tokens + self.completion_tokens;
    }
}

/// Messages and counters owned by exactly one run.
#[derive(Clone, Debug)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
    pub round: u32,
    pub stats: Stats,
}

impl ConversationState {
    pub fn new(system_prompt: &str, user_prompt: &str) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
            round: 0,
            stats: Stats::default(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    pub fn push_final_answer(&mut self, content: &str) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Appends the assistant turn that requested `calls`.
    /// With thinking on, the reasoning trace is always present, empty if the model gave none.
    pub fn push_tool_request(&mut self, content: &str, reasoning: &str, calls: Vec<ToolCall>, thinking: bool) {
        let content = if content.is_empty() { None } else { Some(content.to_string()) };
        self.messages.push(ChatMessage {
            reasoning_content: thinking.then(|| reasoning.to_string()),
            tool_calls: calls,
            ..ChatMessage::new(Role::Assistant, content)
        });
    }

    /// Appends a tool result; `false` if no earlier assistant message made that call.
    pub fn push_tool_result(&mut self, result: &ToolResult) -> bool {
        let known = self.messages.iter().any(|m| {
            m.role == Role::Assistant && m.tool_calls.iter().any(|c| c.id == result.tool_call_id)
        });
        if known {
            self.messages.push(ChatMessage::tool(result));
        }
        known
    }
}

/// One step of a run, in emission order.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    Start {
        model: String,
        thinking: bool,
    },
    Reasoning {
        content: String,
    },
    Message {
        content: String,
    },
    ToolCall {
        round: u32,
        index: usize,
        total: usize,
        call: ToolCall,
    },
    ToolResult {
        round: u32,
        index: usize,
        total: usize,
        result: ToolResult,
    },
    Error {
        message: String,
    },
    End {
        finish_reason: FinishReason,
        stats: Stats,
    },
}

impl ChatEvent {
    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::Start { .. } => "start",
            ChatEvent::Reasoning { .. } => "reasoning",
            ChatEvent::Message { .. } => "message",
            ChatEvent::ToolCall { .. } => "tool_call",
            ChatEvent::ToolResult { .. } => "tool_result",
            ChatEvent::Error { .. } => "error",
            ChatEvent::End { .. } => "end",
        }
    }

    /// Wire payload; the shape is fixed per event type.
    pub fn data(&self) -> Value {
        match self {
            ChatEvent::Start { model, thinking } => json!({
                "model": model,
                "thinking": thinking,
            }),
            ChatEvent::Reasoning { content } | ChatEvent::Message { content } => json!({
                "content": content,
            }),
            ChatEvent::ToolCall { round, index, total, call } => json!({
                "round": round,
                "index": index,
                "total": total,
                "id": call.id,
                "name": call.name,
                "arguments": call.arguments,
            }),
            ChatEvent::ToolResult { round, index, total, result } => json!({
                "round": round,
                "index": index,
                "total": total,
                "id": result.tool_call_id,
                "name": result.name,
                "success": result.success,
                "result": result.payload,
                "error": result.error,
            }),
            ChatEvent::Error { message } => json!({
                "message": message,
            }),
            ChatEvent::End { finish_reason, stats } => json!({
                "finish_reason": finish_reason,
                "stats": stats,
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::End { .. })
    }
}
