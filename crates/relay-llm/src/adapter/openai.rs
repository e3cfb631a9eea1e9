//! `OpenAI` chat completions adapter

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{Adapter, ModelRequest, cancellable, merge_provider_options, with_instructions};
use crate::classify::{ErrorClassification, classify_common};
use crate::client::OpenAiClient;
use crate::error::{LlmError, VendorError};
use crate::format::{OutputSchema, parse_structured};
use crate::protocol::openai::{
    OpenAiChoiceMessage, OpenAiFunction, OpenAiFunctionCall, OpenAiJsonSchema, OpenAiMessage, OpenAiRequest,
    OpenAiResponse, OpenAiResponseFormat, OpenAiTool, OpenAiToolCall,
};
use crate::toolkit::Toolkit;
use crate::types::{EventStream, HistoryItem, Role, StopReason, ToolCall, UsageItem, synthesize_call_id};

/// Error codes `OpenAI` uses for quota exhaustion
const RATE_LIMIT_CODES: &[&str] = &["insufficient_quota", "rate_limit_exceeded"];

/// Adapter for `OpenAI` and compatible chat completion APIs
#[derive(Debug, Clone, Default)]
pub struct OpenAiAdapter {
    max_tokens: Option<u32>,
}

impl OpenAiAdapter {
    pub const fn new(max_tokens: Option<u32>) -> Self {
        Self { max_tokens }
    }

    fn messages(&self, request: &ModelRequest<'_>) -> Vec<OpenAiMessage> {
        let mut messages = Vec::new();

        if let Some(system) = request.system {
            messages.push(OpenAiMessage::text("system", system));
        }

        for item in with_instructions(request.history, request.instructions) {
            match item {
                HistoryItem::Message { role, content } => {
                    let role = match role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    };
                    messages.push(OpenAiMessage::text(role, content));
                }
                HistoryItem::FunctionCall {
                    name,
                    arguments,
                    call_id,
                } => {
                    let call = OpenAiToolCall {
                        id: call_id,
                        tool_type: "function".to_owned(),
                        function: OpenAiFunctionCall { name, arguments },
                    };
                    // Calls from one turn share a single assistant message
                    match messages.last_mut() {
                        Some(OpenAiMessage {
                            tool_calls: Some(calls),
                            ..
                        }) => calls.push(call),
                        _ => messages.push(OpenAiMessage {
                            role: "assistant".to_owned(),
                            content: None,
                            tool_calls: Some(vec![call]),
                            tool_call_id: None,
                        }),
                    }
                }
                HistoryItem::FunctionCallOutput { call_id, name, output } => {
                    let call = ToolCall {
                        id: call_id,
                        name,
                        arguments: String::new(),
                    };
                    messages.push(self.format_tool_result(&call, &output));
                }
            }
        }

        messages
    }

    fn first_message(response: &OpenAiResponse) -> Option<&OpenAiChoiceMessage> {
        response.choices.first().map(|choice| &choice.message)
    }
}

#[async_trait]
impl Adapter for OpenAiAdapter {
    type Client = dyn OpenAiClient;
    type Request = OpenAiRequest;
    type Response = OpenAiResponse;
    type ToolDef = OpenAiTool;
    type Message = OpenAiMessage;

    fn provider(&self) -> &'static str {
        "openai"
    }

    fn build_request(&self, request: &ModelRequest<'_>) -> Result<OpenAiRequest, LlmError> {
        let tools = self.format_tools(request.toolkit, request.schema);

        let response_format = request.schema.map(|schema| OpenAiResponseFormat {
            format_type: "json_schema".to_owned(),
            json_schema: OpenAiJsonSchema {
                name: schema.name().to_owned(),
                schema: schema.schema.clone(),
                // Strict mode rejects schemas that allow extra properties
                strict: schema.schema.get("additionalProperties") == Some(&Value::Bool(false)),
            },
        });

        let mut wire = OpenAiRequest {
            model: request.model.to_owned(),
            messages: self.messages(request),
            temperature: request.temperature,
            max_tokens: self.max_tokens,
            tools: (!tools.is_empty()).then_some(tools),
            response_format,
            ..OpenAiRequest::default()
        };
        merge_provider_options(&mut wire.extra, request.provider_options);

        Ok(wire)
    }

    async fn execute_request(
        &self,
        client: &dyn OpenAiClient,
        request: &OpenAiRequest,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<OpenAiResponse>, VendorError> {
        cancellable(signal, client.chat_completion(request)).await
    }

    async fn execute_stream(
        &self,
        client: &dyn OpenAiClient,
        request: &OpenAiRequest,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<EventStream>, VendorError> {
        cancellable(signal, client.chat_completion_stream(request)).await
    }

    fn response_text(&self, response: &OpenAiResponse) -> String {
        Self::first_message(response)
            .and_then(|message| message.content.clone())
            .unwrap_or_default()
    }

    fn stop_reason(&self, response: &OpenAiResponse) -> Option<StopReason> {
        response
            .choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
            .map(StopReason::parse)
    }

    fn extract_tool_calls(&self, response: &OpenAiResponse) -> Vec<ToolCall> {
        Self::first_message(response)
            .and_then(|message| message.tool_calls.as_ref())
            .into_iter()
            .flatten()
            .map(|call| ToolCall {
                id: if call.id.is_empty() {
                    synthesize_call_id()
                } else {
                    call.id.clone()
                },
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
            })
            .collect()
    }

    fn extract_usage(&self, response: &OpenAiResponse, model: &str) -> UsageItem {
        response.usage.as_ref().map_or_else(
            || UsageItem::zero(self.provider(), model),
            |usage| {
                UsageItem::new(
                    self.provider(),
                    model,
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage
                        .completion_tokens_details
                        .as_ref()
                        .map_or(0, |details| details.reasoning_tokens),
                    Some(usage.total_tokens).filter(|total| *total > 0),
                )
            },
        )
    }

    fn format_tools(&self, toolkit: &Toolkit, _schema: Option<&OutputSchema>) -> Vec<OpenAiTool> {
        // Structured output is native here, so no synthetic tool
        toolkit
            .definitions(None)
            .into_iter()
            .map(|definition| OpenAiTool {
                tool_type: "function".to_owned(),
                function: OpenAiFunction {
                    name: definition.name,
                    description: Some(definition.description),
                    parameters: Some(definition.parameters),
                },
            })
            .collect()
    }

    fn format_tool_result(&self, call: &ToolCall, result: &str) -> OpenAiMessage {
        OpenAiMessage {
            role: "tool".to_owned(),
            content: Some(result.to_owned()),
            tool_calls: None,
            tool_call_id: Some(call.id.clone()),
        }
    }

    fn is_complete(&self, response: &OpenAiResponse) -> bool {
        self.stop_reason(response) != Some(StopReason::ToolCalls) && self.extract_tool_calls(response).is_empty()
    }

    fn classify_error(&self, error: &VendorError) -> ErrorClassification {
        if error.code().is_some_and(|code| RATE_LIMIT_CODES.contains(&code)) {
            return ErrorClassification::rate_limit();
        }
        classify_common(error)
    }

    fn native_structured_output(&self) -> bool {
        true
    }

    fn has_structured_output(&self, response: &OpenAiResponse, schema: Option<&OutputSchema>) -> bool {
        schema.is_some() && self.extract_tool_calls(response).is_empty()
    }

    fn extract_structured_output(
        &self,
        response: &OpenAiResponse,
        schema: Option<&OutputSchema>,
    ) -> Result<Option<Value>, LlmError> {
        if !self.has_structured_output(response, schema) {
            return Ok(None);
        }
        parse_structured(&self.response_text(response)).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::classify::ErrorCategory;
    use crate::format::OutputFormat;
    use crate::testing::{ScriptedOpenAi, openai_text};
    use crate::toolkit::Tool;
    use crate::types::Content;

    fn request<'a>(history: &'a [HistoryItem], toolkit: &'a Toolkit) -> ModelRequest<'a> {
        ModelRequest {
            model: "gpt-4o-mini",
            history,
            system: Some("Be terse"),
            instructions: None,
            toolkit,
            schema: None,
            temperature: Some(0.2),
            provider_options: None,
        }
    }

    #[test]
    fn system_prompt_is_the_first_message() {
        let history = vec![HistoryItem::user("Hello")];
        let toolkit = Toolkit::default();
        let wire = OpenAiAdapter::default()
            .build_request(&request(&history, &toolkit))
            .unwrap();

        assert_eq!(wire.messages.len(), 2);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[1].content.as_deref(), Some("Hello"));
        assert!(wire.tools.is_none());
    }

    #[test]
    fn tool_history_keeps_call_ids() {
        let history = vec![
            HistoryItem::user("List items"),
            HistoryItem::FunctionCall {
                name: "list".to_owned(),
                arguments: "{}".to_owned(),
                call_id: "call_1".to_owned(),
            },
            HistoryItem::FunctionCall {
                name: "count".to_owned(),
                arguments: "{}".to_owned(),
                call_id: "call_2".to_owned(),
            },
            HistoryItem::FunctionCallOutput {
                call_id: "call_1".to_owned(),
                name: "list".to_owned(),
                output: "[1,2]".to_owned(),
            },
        ];
        let toolkit = Toolkit::default();
        let wire = OpenAiAdapter::default()
            .build_request(&request(&history, &toolkit))
            .unwrap();

        let assistant = &wire.messages[2];
        assert_eq!(assistant.tool_calls.as_ref().map(Vec::len), Some(2));
        assert_eq!(wire.messages[3].role, "tool");
        assert_eq!(wire.messages[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn format_uses_native_response_format() {
        let history = vec![HistoryItem::user("Name a color")];
        let toolkit = Toolkit::new([Tool::new("noop", "Does nothing", json!({"type": "object"}), |_| async {
            Ok(json!(null))
        })])
        .unwrap();
        let schema = OutputFormat::Fields(json!({"color": "string"})).to_schema().unwrap();
        let options = json!({"seed": 7});
        let mut req = request(&history, &toolkit);
        req.schema = Some(&schema);
        req.provider_options = Some(&options);

        let wire = OpenAiAdapter::default().build_request(&req).unwrap();
        let format = wire.response_format.unwrap();
        assert!(format.json_schema.strict);
        assert_eq!(wire.tools.unwrap().len(), 1);
        assert_eq!(wire.extra.get("seed"), Some(&json!(7)));
    }

    #[test]
    fn fenced_json_parses_when_format_requested() {
        let schema = OutputFormat::JsonSchema(json!({"type": "object"})).to_schema().unwrap();
        let adapter = OpenAiAdapter::default();

        for text in ["{\"a\":1}", "```json\n{\"a\":1}\n```", "  ```\n{\"a\":1}\n```  "] {
            let parsed = adapter.parse_response(&openai_text(text), Some(&schema)).unwrap();
            assert_eq!(parsed.content, Content::Structured(json!({"a": 1})));
        }
    }

    #[test]
    fn missing_usage_is_zero() {
        let usage = OpenAiAdapter::default().extract_usage(&openai_text("hi"), "gpt-4o-mini");
        assert_eq!((usage.input_tokens, usage.output_tokens, usage.total_tokens), (0, 0, 0));
    }

    #[test]
    fn quota_codes_are_rate_limits() {
        let adapter = OpenAiAdapter::default();
        let error = VendorError::Status {
            status: StatusCode::FORBIDDEN,
            code: Some("insufficient_quota".to_owned()),
            message: "You exceeded your current plan".to_owned(),
        };
        let first = adapter.classify_error(&error);
        assert_eq!(first.category, ErrorCategory::RateLimit);
        assert_eq!(adapter.classify_error(&error), first);
    }

    #[tokio::test]
    async fn cancelled_request_resolves_empty() {
        let client: Arc<dyn OpenAiClient> = Arc::new(ScriptedOpenAi::new(vec![Err(VendorError::Timeout(
            "hung".to_owned(),
        ))]));
        let token = CancellationToken::new();
        token.cancel();

        let result = OpenAiAdapter::default()
            .execute_request(client.as_ref(), &OpenAiRequest::default(), Some(&token))
            .await;
        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn uncancelled_failure_propagates() {
        let client: Arc<dyn OpenAiClient> = Arc::new(ScriptedOpenAi::new(vec![Err(VendorError::Timeout(
            "hung".to_owned(),
        ))]));

        let result = OpenAiAdapter::default()
            .execute_request(client.as_ref(), &OpenAiRequest::default(), Some(&CancellationToken::new()))
            .await;
        assert_eq!(result, Err(VendorError::Timeout("hung".to_owned())));
    }
}
