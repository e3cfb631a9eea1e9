//! Messages API wire shapes
//!
//! Anthropic keeps the system prompt outside `messages` and requires
//! `max_tokens` on every request. Tool traffic travels as content blocks
//! inside ordinary user and assistant messages.

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/messages`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnthropicRequest {
    /// Model to run, e.g. `claude-sonnet-4-5`
    pub model: String,
    /// Output token cap; mandatory for this vendor
    pub max_tokens: u32,
    /// System prompt, sent beside the messages rather than among them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Alternating user and assistant turns, user first
    pub messages: Vec<AnthropicMessage>,
    /// Sampling temperature; vendor default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Ask for server-sent events instead of one JSON body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tools the model may use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    /// Forces or restricts tool use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<AnthropicToolChoice>,
    /// Provider options, flattened into the top level of the body
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One turn of the conversation
///
/// Consecutive same-role turns are merged by the caller before sending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// `user` or `assistant`
    pub role: String,
    /// Text and tool blocks, in order
    pub content: Vec<AnthropicContentBlock>,
}

/// Block inside a request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    /// Plain text
    Text {
        /// Block text
        text: String,
    },
    /// Sent back in assistant turns to replay an earlier tool request
    ToolUse {
        /// `toolu_...` id matched by the result
        id: String,
        /// Tool that was called
        name: String,
        /// Arguments object
        input: serde_json::Value,
    },
    /// Sent in user turns, one per answered `tool_use`
    ToolResult {
        /// Id of the answered `tool_use`
        tool_use_id: String,
        /// Tool output as text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

/// Entry of `tools`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicTool {
    /// Unique within one request
    pub name: String,
    /// Guidance for the model on when to use it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the `input` object
    pub input_schema: serde_json::Value,
}

/// `{"type": "auto" | "any"}` or `{"type": "tool", "name": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicToolChoice {
    /// `auto`, `any` or `tool`
    #[serde(rename = "type")]
    pub choice_type: String,
    /// Required tool when the type is `tool`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AnthropicToolChoice {
    /// Force a call to the named tool
    pub fn tool(name: impl Into<String>) -> Self {
        Self {
            choice_type: "tool".to_owned(),
            name: Some(name.into()),
        }
    }
}

/// Non-streaming answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicResponse {
    /// `msg_...`
    #[serde(default)]
    pub id: String,
    /// Answer blocks, in order
    pub content: Vec<AnthropicResponseBlock>,
    /// Model that actually answered
    #[serde(default)]
    pub model: String,
    /// `end_turn`, `max_tokens`, `stop_sequence` or `tool_use`
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token accounting
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Block inside an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicResponseBlock {
    /// Answer text
    Text {
        /// Block text
        text: String,
    },
    /// Requested tool call
    ToolUse {
        /// `toolu_...` id to answer with a `tool_result`
        id: String,
        /// Tool to run
        name: String,
        /// Arguments object
        input: serde_json::Value,
    },
    /// Thinking and any block type added later; never surfaced
    #[serde(other)]
    Other,
}

/// Token accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicUsage {
    /// Tokens read
    #[serde(default)]
    pub input_tokens: u64,
    /// Tokens written
    #[serde(default)]
    pub output_tokens: u64,
}

/// Server-sent event payloads, discriminated by their `type` field
///
/// Input tokens arrive with `message_start`, output tokens and the stop
/// reason with `message_delta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    /// First event of every stream
    MessageStart {
        /// Envelope carrying the input token count
        message: AnthropicStreamMessage,
    },
    /// A new block begins at `index`
    ContentBlockStart {
        /// Block position within the answer
        index: u32,
        /// Block kind and its fixed fields
        content_block: AnthropicStreamContentBlock,
    },
    /// More content for the block at `index`
    ContentBlockDelta {
        /// Block position within the answer
        index: u32,
        /// Text or argument fragment
        delta: AnthropicStreamDelta,
    },
    /// The block at `index` is complete
    ContentBlockStop {
        /// Block position within the answer
        index: u32,
    },
    /// Stop reason and final output count
    MessageDelta {
        /// Carries the stop reason
        delta: AnthropicMessageDelta,
        /// Cumulative output tokens
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    /// Last event of a successful stream
    MessageStop,
    /// Keep-alive
    Ping,
    /// Overload and similar failures reported after the stream opened
    Error {
        /// What went wrong
        error: AnthropicErrorDetail,
    },
}

/// Message envelope in `message_start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicStreamMessage {
    /// Input tokens, output so far
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Block announced by `content_block_start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamContentBlock {
    /// Text block, normally starting empty
    Text {
        /// Leading text, if any
        #[serde(default)]
        text: String,
    },
    /// Input follows as `input_json_delta` fragments for the same index
    ToolUse {
        /// `toolu_...` id
        id: String,
        /// Tool to run
        name: String,
    },
    /// Thinking and unknown blocks
    #[serde(other)]
    Other,
}

/// Fragment carried by `content_block_delta`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamDelta {
    /// Next piece of answer text
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// Next slice of a tool's encoded input
    InputJsonDelta {
        /// Partial JSON, only valid once concatenated
        partial_json: String,
    },
    /// Thinking and signature deltas
    #[serde(other)]
    Other,
}

/// Delta in `message_delta`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicMessageDelta {
    /// Same values as the non-streaming `stop_reason`
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Error body, streamed or returned with a failing status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicErrorDetail {
    /// e.g. `overloaded_error`
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable explanation
    pub message: String,
}
