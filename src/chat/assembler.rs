use std::collections::BTreeMap;
use tracing::warn;

use crate::llm::ModelChunk;
use crate::tools::ToolCall;

#[derive(Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Complete model response for one round
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelTurn {
    pub content: String,
    pub reasoning: String,
    /// In the order the model emitted them (by call index)
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<(u64, u64)>,
}

/// Collects streamed fragments of one response.
/// Tool-call fragments are joined per call index; ids arrive once, names and
/// arguments may be split across chunks. A name fragment that repeats what
/// was already collected replaces it rather than doubling it.
#[derive(Default)]
pub struct TurnAssembler {
    content: String,
    reasoning: String,
    calls: BTreeMap<u32, PartialCall>,
    usage: Option<(u64, u64)>,
}

impl TurnAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: ModelChunk) {
        match chunk {
            ModelChunk::Reasoning(text) => self.reasoning.push_str(&text),
            ModelChunk::Content(text) => self.content.push_str(&text),
            ModelChunk::ToolCallDelta {
                index,
                id,
                name,
                arguments,
            } => {
                let call = self.calls.entry(index).or_default();
                if let Some(id) = id.filter(|s| !s.is_empty()) {
                    call.id.get_or_insert(id);
                }
                if let Some(name) = name.filter(|s| !s.is_empty()) {
                    // Some providers resend the whole name on every delta
                    if name.starts_with(call.name.as_str()) {
                        call.name = name;
                    } else {
                        call.name.push_str(&name);
                    }
                }
                if let Some(arguments) = arguments {
                    call.arguments.push_str(&arguments);
                }
            }
            ModelChunk::Usage {
                prompt_tokens,
                completion_tokens,
            } => self.usage = Some((prompt_tokens, completion_tokens)),
        }
    }

    pub fn finish(self) -> ModelTurn {
        let tool_calls = self
            .calls
            .into_iter()
            .filter_map(|(index, call)| {
                if call.name.is_empty() {
                    warn!("[CHAT] Dropping tool call #{} without a name", index);
                    return None;
                }
                Some(ToolCall {
                    id: call.id.unwrap_or_else(|| format!("call_{}", index)),
                    name: call.name,
                    arguments: call.arguments,
                })
            })
            .collect();

        ModelTurn {
            content: self.content,
            reasoning: self.reasoning,
            tool_calls,
            usage: self.usage,
        }
    }
}
