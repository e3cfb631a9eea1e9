use std::collections::BTreeMap;
use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};

use super::response::{OperateError, StopReason, ToolCall, UsageItem, synthesize_call_id};
use crate::error::VendorError;

/// Chunk emitted by the stream loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Assistant text fragment
    Text { content: String },
    /// Tool the model asked for (only with `include_tools`)
    ToolCall { id: String, name: String, arguments: String },
    /// Result of a tool run (only with `include_tools`)
    ToolResult { id: String, name: String, result: String },
    /// Terminal failure
    Error {
        status: u16,
        title: String,
        detail: String,
    },
    /// Terminal success, carrying usage of every vendor round-trip
    Done { usage: Vec<UsageItem> },
}

impl StreamChunk {
    /// Whether this chunk is tool traffic hidden unless the caller opted in
    pub const fn is_tool_traffic(&self) -> bool {
        matches!(self, Self::ToolCall { .. } | Self::ToolResult { .. })
    }

    /// Server-sent event name for this chunk
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }
}

impl From<OperateError> for StreamChunk {
    fn from(error: OperateError) -> Self {
        Self::Error {
            status: error.status,
            title: error.title,
            detail: error.detail,
        }
    }
}

/// Vendor stream event, normalized across vendors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text fragment
    Text(String),
    /// Fragment of a tool call; `index` groups fragments of one call
    ToolCallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
    /// Vendor reported why generation ended
    Finish(StopReason),
    /// Token counts (vendors may report them more than once)
    Usage {
        input_tokens: u64,
        output_tokens: u64,
        reasoning_tokens: u64,
    },
    /// Vendor stream finished
    Done,
}

/// Boxed stream of normalized vendor events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, VendorError>> + Send>>;

/// Collects one vendor turn's stream events
#[derive(Debug, Default)]
pub(crate) struct TurnAccumulator {
    pub text: String,
    pub stop_reason: Option<StopReason>,
    input_tokens: u64,
    output_tokens: u64,
    reasoning_tokens: u64,
    calls: BTreeMap<u32, PartialCall>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl TurnAccumulator {
    /// Fold one event in, returning text to forward to the consumer
    pub fn push(&mut self, event: StreamEvent) -> Option<String> {
        match event {
            StreamEvent::Text(text) => {
                self.text.push_str(&text);
                Some(text)
            }
            StreamEvent::ToolCallDelta {
                index,
                id,
                name,
                arguments,
            } => {
                let call = self.calls.entry(index).or_default();
                if let Some(id) = id.filter(|id| !id.is_empty()) {
                    call.id = Some(id);
                }
                if let Some(name) = name {
                    call.name.push_str(&name);
                }
                if let Some(arguments) = arguments {
                    call.arguments.push_str(&arguments);
                }
                None
            }
            StreamEvent::Finish(reason) => {
                self.stop_reason = Some(reason);
                None
            }
            StreamEvent::Usage {
                input_tokens,
                output_tokens,
                reasoning_tokens,
            } => {
                self.input_tokens = self.input_tokens.max(input_tokens);
                self.output_tokens = self.output_tokens.max(output_tokens);
                self.reasoning_tokens = self.reasoning_tokens.max(reasoning_tokens);
                None
            }
            StreamEvent::Done => None,
        }
    }

    /// Completed tool calls in vendor order
    pub fn tool_calls(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.calls)
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| ToolCall {
                id: call.id.unwrap_or_else(synthesize_call_id),
                name: call.name,
                arguments: if call.arguments.trim().is_empty() {
                    "{}".to_owned()
                } else {
                    call.arguments
                },
            })
            .collect()
    }

    pub fn usage(&self, provider: &str, model: &str) -> UsageItem {
        UsageItem::new(
            provider,
            model,
            self.input_tokens,
            self.output_tokens,
            self.reasoning_tokens,
            None,
        )
    }
}
