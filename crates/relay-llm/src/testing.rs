//! Scripted vendor clients and recording hooks for unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::client::{AnthropicClient, OpenAiClient};
use crate::error::{LlmError, ToolError, VendorError};
use crate::hooks::OperateHooks;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse};
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse};
use crate::toolkit::Tool;
use crate::types::{EventStream, HistoryItem, StreamEvent, ToolCall, UsageItem, validate_history};

/// Events one scripted stream yields
pub type ScriptedStream = Vec<Result<StreamEvent, VendorError>>;

fn exhausted<T>() -> Result<T, VendorError> {
    Err(VendorError::Other("script exhausted".to_owned()))
}

fn into_stream(events: ScriptedStream) -> EventStream {
    Box::pin(futures::stream::iter(events))
}

/// `OpenAI` client answering from a fixed script
#[derive(Default)]
pub struct ScriptedOpenAi {
    replies: Mutex<VecDeque<Result<OpenAiResponse, VendorError>>>,
    streams: Mutex<VecDeque<Result<ScriptedStream, VendorError>>>,
    requests: Mutex<Vec<OpenAiRequest>>,
}

impl ScriptedOpenAi {
    pub fn new(replies: Vec<Result<OpenAiResponse, VendorError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn streaming(streams: Vec<Result<ScriptedStream, VendorError>>) -> Self {
        Self {
            streams: Mutex::new(streams.into()),
            ..Self::default()
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<OpenAiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl OpenAiClient for ScriptedOpenAi {
    async fn chat_completion(&self, request: &OpenAiRequest) -> Result<OpenAiResponse, VendorError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies.lock().unwrap().pop_front().unwrap_or_else(exhausted)
    }

    async fn chat_completion_stream(&self, request: &OpenAiRequest) -> Result<EventStream, VendorError> {
        self.requests.lock().unwrap().push(request.clone());
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(exhausted)
            .map(into_stream)
    }
}

/// Anthropic client answering from a fixed script
#[derive(Default)]
pub struct ScriptedAnthropic {
    replies: Mutex<VecDeque<Result<AnthropicResponse, VendorError>>>,
    streams: Mutex<VecDeque<Result<ScriptedStream, VendorError>>>,
}

impl ScriptedAnthropic {
    pub fn new(replies: Vec<Result<AnthropicResponse, VendorError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn streaming(streams: Vec<Result<ScriptedStream, VendorError>>) -> Self {
        Self {
            streams: Mutex::new(streams.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AnthropicClient for ScriptedAnthropic {
    async fn create_message(&self, _request: &AnthropicRequest) -> Result<AnthropicResponse, VendorError> {
        self.replies.lock().unwrap().pop_front().unwrap_or_else(exhausted)
    }

    async fn create_message_stream(&self, _request: &AnthropicRequest) -> Result<EventStream, VendorError> {
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(exhausted)
            .map(into_stream)
    }
}

/// `OpenAI` response carrying plain text
pub fn openai_text(text: &str) -> OpenAiResponse {
    serde_json::from_value(json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o-mini",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
    }))
    .unwrap()
}

/// `OpenAI` response requesting one tool call, with usage
pub fn openai_tool_call(id: &str, name: &str, arguments: &str) -> OpenAiResponse {
    openai_tool_calls(&[(id, name, arguments)])
}

/// `OpenAI` response requesting several tool calls in the given order
pub fn openai_tool_calls(calls: &[(&str, &str, &str)]) -> OpenAiResponse {
    let tool_calls: Vec<_> = calls
        .iter()
        .map(|(id, name, arguments)| json!({"id": id, "type": "function", "function": {"name": name, "arguments": arguments}}))
        .collect();

    serde_json::from_value(json!({
        "id": "chatcmpl-2",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": null, "tool_calls": tool_calls},
            "finish_reason": "tool_calls",
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    }))
    .unwrap()
}

/// Anthropic response from a list of content blocks
pub fn anthropic_response(content: serde_json::Value, stop_reason: &str) -> AnthropicResponse {
    serde_json::from_value(json!({
        "id": "msg_1",
        "model": "claude-sonnet-4-5",
        "content": content,
        "stop_reason": stop_reason,
        "usage": {"input_tokens": 12, "output_tokens": 6},
    }))
    .unwrap()
}

/// Hooks that record every checkpoint as a short label
#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl OperateHooks for RecordingHooks {
    fn before_each_model_request(&self, _provider: &str, _model: &str, turn: u32) {
        self.record(format!("request:{turn}"));
    }

    fn after_each_model_response(&self, _usage: &UsageItem, tool_calls: &[ToolCall]) {
        self.record(format!("response:{}", tool_calls.len()));
    }

    fn before_each_tool(&self, call: &ToolCall) {
        self.record(format!("tool:{}", call.name));
    }

    fn after_each_tool(&self, call: &ToolCall, _output: &str) {
        self.record(format!("tool_done:{}", call.name));
    }

    fn on_tool_error(&self, call: &ToolCall, _error: &ToolError) {
        self.record(format!("tool_error:{}", call.name));
    }

    fn on_unrecoverable_model_error(&self, error: &LlmError) {
        self.record(format!("unrecoverable:{}", error.error_type()));
    }
}

/// Assert every function output follows its own call, one output per call
pub fn assert_calls_paired(history: &[HistoryItem]) {
    validate_history(history).unwrap();
    let calls = history
        .iter()
        .filter(|item| matches!(item, HistoryItem::FunctionCall { .. }))
        .count();
    let outputs = history
        .iter()
        .filter(|item| matches!(item, HistoryItem::FunctionCallOutput { .. }))
        .count();
    assert_eq!(calls, outputs);
}

/// Tool that records the `city` argument of every call, in call order
pub fn city_recorder(name: &str, seen: Arc<Mutex<Vec<String>>>) -> Tool {
    Tool::new(name, "Records the requested city", json!({"type": "object"}), move |args| {
        let seen = seen.clone();
        async move {
            let city = args["city"].as_str().unwrap_or_default().to_owned();
            seen.lock().unwrap().push(city.clone());
            Ok(json!({"city": city}))
        }
    })
}
