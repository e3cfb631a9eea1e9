//! Chat-completions wire shapes
//!
//! Also spoken by most `OpenAI`-compatible servers (vLLM, Ollama, LM Studio),
//! so unknown response fields are tolerated everywhere.

use serde::{Deserialize, Serialize};

/// Body of `POST /chat/completions`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAiRequest {
    /// Model to run, e.g. `gpt-4o-mini`
    pub model: String,
    /// Full conversation, system prompt first
    pub messages: Vec<OpenAiMessage>,
    /// Sampling temperature; vendor default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Output token cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Ask for server-sent events instead of one JSON body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Functions the model may call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiTool>>,
    /// `auto`, `none`, `required` or a named function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Native structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<OpenAiResponseFormat>,
    /// Set on streaming requests so the last chunk reports usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<OpenAiStreamOptions>,
    /// Provider options, flattened into the top level of the body
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `stream_options` of a streaming request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiStreamOptions {
    /// Append a usage-only chunk before `[DONE]`
    #[serde(default)]
    pub include_usage: bool,
}

/// One entry of `messages`
///
/// Assistant turns that requested tools carry `tool_calls`; tool turns
/// answer one call through `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiMessage {
    /// `system`, `user`, `assistant` or `tool`
    pub role: String,
    /// Message text; null on assistant turns that only call tools
    #[serde(default)]
    pub content: Option<String>,
    /// Calls requested in this assistant turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    /// Call answered by this tool turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl OpenAiMessage {
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_owned(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Entry of `tools`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiTool {
    /// Always `function`
    #[serde(rename = "type")]
    pub tool_type: String,
    /// What the model sees of the tool
    pub function: OpenAiFunction,
}

/// Name, description and argument schema of a callable function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiFunction {
    /// Unique within one request
    pub name: String,
    /// Guidance for the model on when to call it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Function invocation requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    /// Correlates the call with its tool message; some compatible servers
    /// leave it empty
    #[serde(default)]
    pub id: String,
    /// Always `function`
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    /// Which function, with what arguments
    pub function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_owned()
}

/// Function name plus encoded arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiFunctionCall {
    /// Name from the request's `tools`
    pub name: String,
    /// Arguments as a JSON document encoded in a string
    #[serde(default)]
    pub arguments: String,
}

/// `response_format` asking for schema-conforming JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiResponseFormat {
    /// Always `json_schema`
    #[serde(rename = "type")]
    pub format_type: String,
    /// Schema the answer must satisfy
    pub json_schema: OpenAiJsonSchema,
}

/// Named schema inside `response_format`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiJsonSchema {
    /// Identifier, letters digits and underscores only
    pub name: String,
    /// JSON schema object
    pub schema: serde_json::Value,
    /// Reject answers that deviate from the schema
    #[serde(default)]
    pub strict: bool,
}

/// Non-streaming completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiResponse {
    /// `chatcmpl-...`
    #[serde(default)]
    pub id: String,
    /// Model that actually answered
    #[serde(default)]
    pub model: String,
    /// Alternatives; the loop only reads the first
    pub choices: Vec<OpenAiChoice>,
    /// Absent on some compatible servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAiUsage>,
}

/// One alternative answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiChoice {
    /// Position in `choices`
    #[serde(default)]
    pub index: u32,
    /// The assistant turn
    pub message: OpenAiChoiceMessage,
    /// `stop`, `length`, `tool_calls` or `content_filter`
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant turn inside a choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiChoiceMessage {
    /// Always `assistant`
    #[serde(default)]
    pub role: String,
    /// Answer text, absent when only tools were called
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Requested function calls, in the order to run them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
}

/// Token accounting for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiUsage {
    /// Tokens read
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens written, reasoning included
    #[serde(default)]
    pub completion_tokens: u64,
    /// Sum as reported by the vendor
    #[serde(default)]
    pub total_tokens: u64,
    /// Only reasoning models report this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<OpenAiCompletionTokensDetails>,
}

/// Split of `completion_tokens`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiCompletionTokensDetails {
    /// Hidden chain-of-thought tokens
    #[serde(default)]
    pub reasoning_tokens: u64,
}

/// One `data:` payload of a streamed completion
///
/// The usage-only chunk sent last under `include_usage` has no choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamChunk {
    /// Deltas, usually exactly one
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    /// Present on the usage-only chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAiUsage>,
}

/// Delta for one alternative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamChoice {
    /// Position in `choices`
    #[serde(default)]
    pub index: u32,
    /// What this chunk adds
    #[serde(default)]
    pub delta: OpenAiStreamDelta,
    /// Set on the last delta of the choice
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental assistant output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamDelta {
    /// Next piece of answer text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Next pieces of one or more tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

/// Fragment of a tool call
///
/// Fragments sharing an `index` belong to the same call. The id and name
/// arrive on the first fragment; later ones only extend `arguments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamToolCall {
    /// Position of the call within the turn
    pub index: u32,
    /// First fragment only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name and argument text so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<OpenAiStreamFunctionCall>,
}

/// Function part of a tool-call fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamFunctionCall {
    /// First fragment only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Next slice of the encoded arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
