//! AWS Bedrock Converse adapter

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{Adapter, ModelRequest, arguments_value, cancellable, synthetic_structured_output, with_instructions};
use crate::classify::{ErrorClassification, classify_common};
use crate::client::BedrockClient;
use crate::error::{LlmError, VendorError};
use crate::format::{OutputSchema, STRUCTURED_OUTPUT_TOOL, parse_structured};
use crate::protocol::bedrock::{
    BedrockBlock, BedrockMessage, BedrockRole, BedrockToolChoice, BedrockToolSpec, ConverseRequest, ConverseResponse,
};
use crate::toolkit::Toolkit;
use crate::types::{EventStream, HistoryItem, Role, StopReason, ToolCall, UsageItem, synthesize_call_id};

/// Adapter for the Bedrock Converse API
#[derive(Debug, Clone, Default)]
pub struct BedrockAdapter {
    max_tokens: Option<u32>,
}

impl BedrockAdapter {
    pub const fn new(max_tokens: Option<u32>) -> Self {
        Self { max_tokens }
    }

    fn messages(&self, request: &ModelRequest<'_>) -> Vec<BedrockMessage> {
        let mut messages: Vec<BedrockMessage> = Vec::new();

        for item in with_instructions(request.history, request.instructions) {
            let message = match item {
                HistoryItem::Message { role, content } => BedrockMessage {
                    role: match role {
                        Role::User => BedrockRole::User,
                        Role::Assistant => BedrockRole::Assistant,
                    },
                    content: vec![BedrockBlock::Text(content)],
                },
                HistoryItem::FunctionCall {
                    name,
                    arguments,
                    call_id,
                } => BedrockMessage {
                    role: BedrockRole::Assistant,
                    content: vec![BedrockBlock::ToolUse {
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

            match messages.last_mut() {
                Some(last) if last.role == message.role => last.content.extend(message.content),
                _ => messages.push(message),
            }
        }

        messages
    }

    fn tool_uses(response: &ConverseResponse) -> impl Iterator<Item = (&String, &String, &Value)> {
        response.content.iter().filter_map(|block| match block {
            BedrockBlock::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        })
    }
}

#[async_trait]
impl Adapter for BedrockAdapter {
    type Client = dyn BedrockClient;
    type Request = ConverseRequest;
    type Response = ConverseResponse;
    type ToolDef = BedrockToolSpec;
    type Message = BedrockMessage;

    fn provider(&self) -> &'static str {
        "bedrock"
    }

    fn build_request(&self, request: &ModelRequest<'_>) -> Result<ConverseRequest, LlmError> {
        let tools = self.format_tools(request.toolkit, request.schema);
        let tool_choice = (request.schema.is_some() && request.toolkit.is_empty())
            .then(|| BedrockToolChoice::Tool(STRUCTURED_OUTPUT_TOOL.to_owned()));

        #[allow(clippy::cast_possible_truncation)]
        let temperature = request.temperature.map(|t| t as f32);

        Ok(ConverseRequest {
            model_id: request.model.to_owned(),
            system: request.system.map(ToOwned::to_owned).into_iter().collect(),
            messages: self.messages(request),
            tools,
            tool_choice,
            max_tokens: self.max_tokens,
            temperature,
            additional_model_request_fields: request.provider_options.filter(|options| options.is_object()).cloned(),
        })
    }

    async fn execute_request(
        &self,
        client: &dyn BedrockClient,
        request: &ConverseRequest,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<ConverseResponse>, VendorError> {
        cancellable(signal, client.converse(request)).await
    }

    async fn execute_stream(
        &self,
        client: &dyn BedrockClient,
        request: &ConverseRequest,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<EventStream>, VendorError> {
        cancellable(signal, client.converse_stream(request)).await
    }

    fn response_text(&self, response: &ConverseResponse) -> String {
        response
            .content
            .iter()
            .filter_map(|block| match block {
                BedrockBlock::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn stop_reason(&self, response: &ConverseResponse) -> Option<StopReason> {
        Some(response.stop_reason.as_str())
            .filter(|reason| !reason.is_empty())
            .map(StopReason::parse)
    }

    fn extract_tool_calls(&self, response: &ConverseResponse) -> Vec<ToolCall> {
        Self::tool_uses(response)
            .map(|(id, name, input)| ToolCall {
                id: if id.is_empty() { synthesize_call_id() } else { id.clone() },
                name: name.clone(),
                arguments: input.to_string(),
            })
            .collect()
    }

    fn extract_usage(&self, response: &ConverseResponse, model: &str) -> UsageItem {
        response.usage.as_ref().map_or_else(
            || UsageItem::zero(self.provider(), model),
            |usage| {
                UsageItem::new(
                    self.provider(),
                    model,
                    usage.input_tokens,
                    usage.output_tokens,
                    0,
                    Some(usage.total_tokens).filter(|total| *total > 0),
                )
            },
        )
    }

    fn format_tools(&self, toolkit: &Toolkit, schema: Option<&OutputSchema>) -> Vec<BedrockToolSpec> {
        toolkit
            .definitions(schema)
            .into_iter()
            .map(|definition| BedrockToolSpec {
                name: definition.name,
                description: definition.description,
                input_schema: definition.parameters,
            })
            .collect()
    }

    fn format_tool_result(&self, call: &ToolCall, result: &str) -> BedrockMessage {
        BedrockMessage {
            role: BedrockRole::User,
            content: vec![BedrockBlock::ToolResult {
                id: call.id.clone(),
                content: result.to_owned(),
            }],
        }
    }

    fn is_complete(&self, response: &ConverseResponse) -> bool {
        self.stop_reason(response) != Some(StopReason::ToolCalls) && Self::tool_uses(response).next().is_none()
    }

    fn classify_error(&self, error: &VendorError) -> ErrorClassification {
        match error.code() {
            Some("ThrottlingException" | "ServiceQuotaExceededException") => ErrorClassification::rate_limit(),
            Some(
                "ServiceUnavailableException"
                | "InternalServerException"
                | "ModelTimeoutException"
                | "ModelNotReadyException",
            ) => ErrorClassification::retryable(),
            Some("AccessDeniedException" | "ValidationException" | "ResourceNotFoundException") => {
                ErrorClassification::unrecoverable()
            }
            _ => classify_common(error),
        }
    }

    fn has_structured_output(&self, response: &ConverseResponse, schema: Option<&OutputSchema>) -> bool {
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
        response: &ConverseResponse,
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
