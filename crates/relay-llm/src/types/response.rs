use serde::{Deserialize, Serialize};

use super::history::HistoryItem;
use crate::error::LlmError;

/// Tool invocation extracted from a vendor response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Vendor call id, or a synthesized `call_*` id
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl ToolCall {
    /// History entry recording this call
    pub fn to_history(&self) -> HistoryItem {
        HistoryItem::FunctionCall {
            name: self.name.clone(),
            arguments: self.arguments.clone(),
            call_id: self.id.clone(),
        }
    }
}

/// Generate a call id for vendors that do not supply one
pub fn synthesize_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of the answer
    Stop,
    /// Output token limit reached
    Length,
    /// Model wants tools run
    ToolCalls,
    /// Vendor safety filtering
    ContentFilter,
    /// Anything else the vendor reported
    Other,
}

impl StopReason {
    /// Parse the stop reasons used across the supported vendors
    pub fn parse(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" | "STOP" | "stop_sequence" => Self::Stop,
            "length" | "max_tokens" | "MAX_TOKENS" => Self::Length,
            "tool_calls" | "tool_use" | "function_call" => Self::ToolCalls,
            "content_filter" | "content_filtered" | "SAFETY" | "guardrail_intervened" => Self::ContentFilter,
            _ => Self::Other,
        }
    }
}

/// Token usage for one vendor round-trip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageItem {
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
    pub total_tokens: u64,
}

impl UsageItem {
    /// Usage record with all counts zero
    pub fn zero(provider: &str, model: &str) -> Self {
        Self {
            provider: provider.to_owned(),
            model: model.to_owned(),
            ..Self::default()
        }
    }

    /// Usage record, deriving the total when the vendor omitted it
    pub fn new(provider: &str, model: &str, input: u64, output: u64, reasoning: u64, total: Option<u64>) -> Self {
        Self {
            provider: provider.to_owned(),
            model: model.to_owned(),
            input_tokens: input,
            output_tokens: output,
            reasoning_tokens: reasoning,
            total_tokens: total.filter(|t| *t > 0).unwrap_or(input + output),
        }
    }
}

/// Assistant answer of a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    /// Parsed value conforming to the requested output schema
    Structured(serde_json::Value),
}

impl Content {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Text written to history for this answer
    pub fn to_history_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// Content, tool-call flag and stop reason of one vendor response
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub content: Content,
    pub has_tool_calls: bool,
    pub stop_reason: Option<StopReason>,
}

/// Terminal state of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperateStatus {
    Completed,
    Incomplete,
}

/// Error payload carried by incomplete results and `error` stream chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperateError {
    pub status: u16,
    pub title: String,
    pub detail: String,
}

impl OperateError {
    /// Turn budget spent while the model still wants tools
    pub fn turn_limit(turns: u32) -> Self {
        Self {
            status: 429,
            title: "Too Many Requests".to_owned(),
            detail: format!("Model requested function call but exceeded {turns} turns"),
        }
    }

    /// Caller cancelled the call
    pub fn cancelled() -> Self {
        Self {
            status: 499,
            title: "Client Closed Request".to_owned(),
            detail: "Model request was cancelled".to_owned(),
        }
    }
}

impl From<&LlmError> for OperateError {
    fn from(error: &LlmError) -> Self {
        let status = error.status_code();
        Self {
            status: status.as_u16(),
            title: status.canonical_reason().unwrap_or("Error").to_owned(),
            detail: error.client_message(),
        }
    }
}

/// Result of an operate call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperateResponse {
    pub content: Content,
    /// Full updated history; the caller owns it from here on
    pub history: Vec<HistoryItem>,
    pub status: OperateStatus,
    /// One entry per vendor round-trip
    pub usage: Vec<UsageItem>,
    /// Present exactly when `status` is `Incomplete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperateError>,
}
