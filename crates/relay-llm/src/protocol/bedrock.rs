//! AWS Bedrock Converse API shapes
//!
//! Plain data mirroring the Converse request and response. The SDK-backed
//! client translates these to and from the SDK's builder types.

use serde::{Deserialize, Serialize};

/// Converse request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseRequest {
    /// Model identifier
    pub model_id: String,
    /// System prompt blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<String>,
    /// Conversation messages
    pub messages: Vec<BedrockMessage>,
    /// Tool specifications
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<BedrockToolSpec>,
    /// Tool choice, when tools are present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<BedrockToolChoice>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Model-specific request fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_model_request_fields: Option<serde_json::Value>,
}

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BedrockRole {
    User,
    Assistant,
}

/// Converse message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BedrockMessage {
    /// Author role
    pub role: BedrockRole,
    /// Content blocks
    pub content: Vec<BedrockBlock>,
}

/// Converse content block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BedrockBlock {
    /// Text content
    Text(String),
    /// Tool use request
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool input
        input: serde_json::Value,
    },
    /// Tool result
    ToolResult {
        /// Tool use ID this result answers
        id: String,
        /// JSON-encoded result
        content: String,
    },
}

/// Tool specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BedrockToolSpec {
    /// Tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for the input
    pub input_schema: serde_json::Value,
}

/// Tool choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BedrockToolChoice {
    /// Model decides
    Auto,
    /// Model must call some tool
    Any,
    /// Model must call this tool
    Tool(String),
}

/// Converse response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseResponse {
    /// Assistant content blocks
    pub content: Vec<BedrockBlock>,
    /// Stop reason (`end_turn`, `tool_use`, `max_tokens`, ...)
    pub stop_reason: String,
    /// Token usage
    #[serde(default)]
    pub usage: Option<BedrockUsage>,
}

/// Token usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BedrockUsage {
    /// Input tokens
    pub input_tokens: u64,
    /// Output tokens
    pub output_tokens: u64,
    /// Total tokens
    pub total_tokens: u64,
}
