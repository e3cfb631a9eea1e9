//! Anthropic Messages adapter

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{
    Adapter, ModelRequest, arguments_value, cancellable, merge_provider_options, synthetic_structured_output,
    with_instructions,
};
use crate::classify::{ErrorClassification, classify_common};
use crate::client::AnthropicClient;
use crate::error::{LlmError, VendorError};
use crate::format::{OutputSchema, STRUCTURED_OUTPUT_TOOL, parse_structured};
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicResponseBlock,
    AnthropicTool, AnthropicToolChoice,
};
use crate::toolkit::Toolkit;
use crate::types::{EventStream, HistoryItem, Role, StopReason, ToolCall, UsageItem, synthesize_call_id};

/// Output budget used when the provider config sets none
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Adapter for the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    max_tokens: u32,
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AnthropicAdapter {
    pub fn new(max_tokens: Option<u32>) -> Self {
        Self {
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    fn messages(&self, request: &ModelRequest<'_>) -> Vec<AnthropicMessage> {
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for item in with_instructions(request.history, request.instructions) {
            let message = match item {
                HistoryItem::Message { role, content } => AnthropicMessage {
                    role: match role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    }
                    .to_owned(),
                    content: vec![AnthropicContentBlock::Text { text: content }],
                },
                HistoryItem::FunctionCall {
                    name,
                    arguments,
                    call_id,
                } => AnthropicMessage {
                    role: "assistant".to_owned(),
                    content: vec![AnthropicContentBlock::ToolUse {
                        id: call_id,
                        name,
                        input: arguments_value(&arguments),
                    }],
                },
                HistoryItem::FunctionCallOutput { call_id, name, output } => {
                    let call = ToolCall {
                        id: call_id,
                        name,
                        arguments: String::new(),
                    };
                    self.format_tool_result(&call, &output)
                }
            };

            // Anthropic requires alternating roles, so adjacent same-role
            // messages collapse into one
            match messages.last_mut() {
                Some(last) if last.role == message.role => last.content.extend(message.content),
                _ => messages.push(message),
            }
        }

        messages
    }

    fn tool_uses(response: &AnthropicResponse) -> impl Iterator<Item = (&String, &String, &Value)> {
        response.content.iter().filter_map(|block| match block {
            AnthropicResponseBlock::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        })
    }
}

#[async_trait]
impl Adapter for AnthropicAdapter {
    type Client = dyn AnthropicClient;
    type Request = AnthropicRequest;
    type Response = AnthropicResponse;
    type ToolDef = AnthropicTool;
    type Message = AnthropicMessage;

    fn provider(&self) -> &'static str {
        "anthropic"
    }

    fn build_request(&self, request: &ModelRequest<'_>) -> Result<AnthropicRequest, LlmError> {
        let tools = self.format_tools(request.toolkit, request.schema);

        // Force the synthetic tool when it is the only one offered
        let tool_choice = (request.schema.is_some() && request.toolkit.is_empty())
            .then(|| AnthropicToolChoice::tool(STRUCTURED_OUTPUT_TOOL));

        let mut wire = AnthropicRequest {
            model: request.model.to_owned(),
            max_tokens: self.max_tokens,
            system: request.system.map(ToOwned::to_owned),
            messages: self.messages(request),
            temperature: request.temperature,
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice,
            ..AnthropicRequest::default()
        };
        merge_provider_options(&mut wire.extra, request.provider_options);

        Ok(wire)
    }

    async fn execute_request(
        &self,
        client: &dyn AnthropicClient,
        request: &AnthropicRequest,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<AnthropicResponse>, VendorError> {
        cancellable(signal, client.create_message(request)).await
    }

    async fn execute_stream(
        &self,
        client: &dyn AnthropicClient,
        request: &AnthropicRequest,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<EventStream>, VendorError> {
        cancellable(signal, client.create_message_stream(request)).await
    }

    fn response_text(&self, response: &AnthropicResponse) -> String {
        response
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn stop_reason(&self, response: &AnthropicResponse) -> Option<StopReason> {
        response.stop_reason.as_deref().map(StopReason::parse)
    }

    fn extract_tool_calls(&self, response: &AnthropicResponse) -> Vec<ToolCall> {
        Self::tool_uses(response)
            .map(|(id, name, input)| ToolCall {
                id: if id.is_empty() { synthesize_call_id() } else { id.clone() },
                name: name.clone(),
                arguments: input.to_string(),
            })
            .collect()
    }

    fn extract_usage(&self, response: &AnthropicResponse, model: &str) -> UsageItem {
        response.usage.as_ref().map_or_else(
            || UsageItem::zero(self.provider(), model),
            |usage| UsageItem::new(self.provider(), model, usage.input_tokens, usage.output_tokens, 0, None),
        )
    }

    fn format_tools(&self, toolkit: &Toolkit, schema: Option<&OutputSchema>) -> Vec<AnthropicTool> {
        toolkit
            .definitions(schema)
            .into_iter()
            .map(|definition| AnthropicTool {
                name: definition.name,
                description: Some(definition.description),
                input_schema: definition.parameters,
            })
            .collect()
    }

    fn format_tool_result(&self, call: &ToolCall, result: &str) -> AnthropicMessage {
        AnthropicMessage {
            role: "user".to_owned(),
            content: vec![AnthropicContentBlock::ToolResult {
                tool_use_id: call.id.clone(),
                content: Some(result.to_owned()),
            }],
        }
    }

    fn is_complete(&self, response: &AnthropicResponse) -> bool {
        self.stop_reason(response) != Some(StopReason::ToolCalls) && Self::tool_uses(response).next().is_none()
    }

    fn classify_error(&self, error: &VendorError) -> ErrorClassification {
        match error.code() {
            Some("overloaded_error") => ErrorClassification::retryable(),
            Some("rate_limit_error") => ErrorClassification::rate_limit(),
            _ => classify_common(error),
        }
    }

    fn has_structured_output(&self, response: &AnthropicResponse, schema: Option<&OutputSchema>) -> bool {
        if schema.is_none() {
            return false;
        }
        let mut calls = Self::tool_uses(response).map(|(_, name, _)| name).peekable();
        if calls.peek().is_none() {
            return parse_structured(&self.response_text(response)).is_ok();
        }
        calls.any(|name| name == STRUCTURED_OUTPUT_TOOL)
    }

    fn extract_structured_output(
        &self,
        response: &AnthropicResponse,
        schema: Option<&OutputSchema>,
    ) -> Result<Option<Value>, LlmError> {
        if !self.has_structured_output(response, schema) {
            return Ok(None);
        }
        match synthetic_structured_output(&self.extract_tool_calls(response)) {
            Some(value) => value.map(Some),
            None => parse_structured(&self.response_text(response)).map(Some),
        }
    }
}
