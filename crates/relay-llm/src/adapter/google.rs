//! Google Generative Language adapter

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{Adapter, ModelRequest, cancellable, merge_provider_options, with_instructions};
use crate::classify::{ErrorClassification, classify_common};
use crate::client::GoogleClient;
use crate::error::{LlmError, VendorError};
use crate::format::{OutputSchema, parse_structured};
use crate::protocol::google::{
    GoogleContent, GoogleFunctionCall, GoogleFunctionDeclaration, GoogleFunctionResponse, GoogleGenerationConfig,
    GooglePart, GoogleRequest, GoogleResponse, GoogleTool,
};
use crate::toolkit::Toolkit;
use crate::types::{EventStream, HistoryItem, Role, StopReason, ToolCall, UsageItem, synthesize_call_id};

/// Schema keywords the Gemini API rejects
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties"];

/// Request body plus the model it is addressed to
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleCall {
    pub model: String,
    pub body: GoogleRequest,
}

/// Adapter for the Gemini `generateContent` API
#[derive(Debug, Clone, Default)]
pub struct GoogleAdapter {
    max_tokens: Option<u32>,
}

impl GoogleAdapter {
    pub const fn new(max_tokens: Option<u32>) -> Self {
        Self { max_tokens }
    }

    fn contents(&self, request: &ModelRequest<'_>) -> Vec<GoogleContent> {
        let mut contents: Vec<GoogleContent> = Vec::new();

        for item in with_instructions(request.history, request.instructions) {
            let content = match item {
                HistoryItem::Message { role, content } => GoogleContent {
                    role: Some(
                        match role {
                            Role::User => "user",
                            Role::Assistant => "model",
                        }
                        .to_owned(),
                    ),
                    parts: vec![GooglePart::text(content)],
                },
                HistoryItem::FunctionCall { name, arguments, .. } => GoogleContent {
                    role: Some("model".to_owned()),
                    parts: vec![GooglePart {
                        function_call: Some(GoogleFunctionCall {
                            name,
                            args: super::arguments_value(&arguments),
                        }),
                        ..GooglePart::default()
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

            match contents.last_mut() {
                Some(last) if last.role == content.role => last.parts.extend(content.parts),
                _ => contents.push(content),
            }
        }

        contents
    }

    fn parts(response: &GoogleResponse) -> impl Iterator<Item = &GooglePart> {
        response
            .candidates
            .first()
            .into_iter()
            .flat_map(|candidate| candidate.content.parts.iter())
            .filter(|part| part.thought != Some(true))
    }
}

/// Drop schema keywords Gemini does not accept, at any depth
fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), sanitize_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

#[async_trait]
impl Adapter for GoogleAdapter {
    type Client = dyn GoogleClient;
    type Request = GoogleCall;
    type Response = GoogleResponse;
    type ToolDef = GoogleFunctionDeclaration;
    type Message = GoogleContent;

    fn provider(&self) -> &'static str {
        "google"
    }

    fn build_request(&self, request: &ModelRequest<'_>) -> Result<GoogleCall, LlmError> {
        let declarations = self.format_tools(request.toolkit, request.schema);

        let generation_config = GoogleGenerationConfig {
            temperature: request.temperature,
            max_output_tokens: self.max_tokens,
            response_mime_type: request.schema.map(|_| "application/json".to_owned()),
            response_schema: request.schema.map(|schema| sanitize_schema(&schema.schema)),
        };

        let mut body = GoogleRequest {
            contents: self.contents(request),
            system_instruction: request.system.map(|system| GoogleContent {
                role: None,
                parts: vec![GooglePart::text(system)],
            }),
            generation_config: Some(generation_config).filter(|config| *config != GoogleGenerationConfig::default()),
            tools: (!declarations.is_empty()).then(|| {
                vec![GoogleTool {
                    function_declarations: declarations,
                }]
            }),
            ..GoogleRequest::default()
        };
        merge_provider_options(&mut body.extra, request.provider_options);

        Ok(GoogleCall {
            model: request.model.to_owned(),
            body,
        })
    }

    async fn execute_request(
        &self,
        client: &dyn GoogleClient,
        request: &GoogleCall,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<GoogleResponse>, VendorError> {
        cancellable(signal, client.generate_content(&request.model, &request.body)).await
    }

    async fn execute_stream(
        &self,
        client: &dyn GoogleClient,
        request: &GoogleCall,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<EventStream>, VendorError> {
        cancellable(signal, client.stream_generate_content(&request.model, &request.body)).await
    }

    fn response_text(&self, response: &GoogleResponse) -> String {
        Self::parts(response).filter_map(|part| part.text.as_deref()).collect()
    }

    fn stop_reason(&self, response: &GoogleResponse) -> Option<StopReason> {
        response
            .candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_deref())
            .map(StopReason::parse)
    }

    fn extract_tool_calls(&self, response: &GoogleResponse) -> Vec<ToolCall> {
        // Gemini never returns call ids
        Self::parts(response)
            .filter_map(|part| part.function_call.as_ref())
            .map(|call| ToolCall {
                id: synthesize_call_id(),
                name: call.name.clone(),
                arguments: call.args.to_string(),
            })
            .collect()
    }

    fn extract_usage(&self, response: &GoogleResponse, model: &str) -> UsageItem {
        response.usage_metadata.as_ref().map_or_else(
            || UsageItem::zero(self.provider(), model),
            |usage| {
                UsageItem::new(
                    self.provider(),
                    model,
                    usage.prompt_token_count,
                    usage.candidates_token_count + usage.thoughts_token_count,
                    usage.thoughts_token_count,
                    Some(usage.total_token_count).filter(|total| *total > 0),
                )
            },
        )
    }

    fn format_tools(&self, toolkit: &Toolkit, _schema: Option<&OutputSchema>) -> Vec<GoogleFunctionDeclaration> {
        toolkit
            .definitions(None)
            .into_iter()
            .map(|definition| GoogleFunctionDeclaration {
                name: definition.name,
                description: Some(definition.description),
                parameters: Some(sanitize_schema(&definition.parameters)),
            })
            .collect()
    }

    fn format_tool_result(&self, call: &ToolCall, result: &str) -> GoogleContent {
        // functionResponse.response must be an object
        let response = match serde_json::from_str::<Value>(result) {
            Ok(value @ Value::Object(_)) => value,
            Ok(value) => serde_json::json!({ "result": value }),
            Err(_) => serde_json::json!({ "result": result }),
        };

        GoogleContent {
            role: Some("user".to_owned()),
            parts: vec![GooglePart {
                function_response: Some(GoogleFunctionResponse {
                    name: call.name.clone(),
                    response,
                }),
                ..GooglePart::default()
            }],
        }
    }

    fn is_complete(&self, response: &GoogleResponse) -> bool {
        Self::parts(response).all(|part| part.function_call.is_none())
    }

    fn classify_error(&self, error: &VendorError) -> ErrorClassification {
        match error.code() {
            Some("RESOURCE_EXHAUSTED") => ErrorClassification::rate_limit(),
            Some("UNAVAILABLE" | "INTERNAL" | "DEADLINE_EXCEEDED") => ErrorClassification::retryable(),
            Some("INVALID_ARGUMENT" | "PERMISSION_DENIED" | "UNAUTHENTICATED" | "NOT_FOUND" | "FAILED_PRECONDITION") => {
                ErrorClassification::unrecoverable()
            }
            _ => classify_common(error),
        }
    }

    fn native_structured_output(&self) -> bool {
        true
    }

    fn has_structured_output(&self, response: &GoogleResponse, schema: Option<&OutputSchema>) -> bool {
        schema.is_some() && self.is_complete(response)
    }

    fn extract_structured_output(
        &self,
        response: &GoogleResponse,
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
    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::classify::ErrorCategory;
    use crate::format::OutputFormat;
    use crate::types::Content;

    fn response(json: &str) -> GoogleResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn builds_contents_with_model_role_and_function_parts() {
        let history = vec![
            HistoryItem::user("Weather?"),
            HistoryItem::FunctionCall {
                name: "weather".to_owned(),
                arguments: r#"{"city":"Oslo"}"#.to_owned(),
                call_id: "call_1".to_owned(),
            },
            HistoryItem::FunctionCallOutput {
                call_id: "call_1".to_owned(),
                name: "weather".to_owned(),
                output: "\"snow\"".to_owned(),
            },
        ];
        let toolkit = Toolkit::default();
        let schema = OutputFormat::Fields(json!({"summary": "string"})).to_schema().unwrap();
        let call = GoogleAdapter::default()
            .build_request(&ModelRequest {
                model: "gemini-2.0-flash",
                history: &history,
                system: Some("Be brief"),
                instructions: None,
                toolkit: &toolkit,
                schema: Some(&schema),
                temperature: None,
                provider_options: None,
            })
            .unwrap();

        assert_eq!(call.model, "gemini-2.0-flash");
        let body = serde_json::to_value(&call.body).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["functionCall"]["args"], json!({"city": "Oslo"}));
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["response"],
            json!({"result": "snow"})
        );
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(body["generationConfig"]["responseSchema"].get("additionalProperties").is_none());
    }

    #[test]
    fn function_calls_get_synthesized_ids() {
        let adapter = GoogleAdapter::default();
        let resp = response(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"functionCall":{"name":"weather","args":{"city":"Oslo"}}}]},
                "finishReason":"STOP"}]}"#,
        );

        let calls = adapter.extract_tool_calls(&resp);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].id.starts_with("call_"));
        assert!(!adapter.is_complete(&resp));
    }

    #[test]
    fn usage_counts_thoughts_as_reasoning_output() {
        let adapter = GoogleAdapter::default();
        let resp = response(
            r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}],
                "usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":2,"thoughtsTokenCount":6,"totalTokenCount":12}}"#,
        );

        let usage = adapter.extract_usage(&resp, "gemini-2.5-pro");
        assert_eq!(
            (usage.input_tokens, usage.output_tokens, usage.reasoning_tokens, usage.total_tokens),
            (4, 8, 6, 12)
        );
    }

    #[test]
    fn native_structured_output_parses_text() {
        let adapter = GoogleAdapter::default();
        let schema = OutputFormat::JsonSchema(json!({"type": "object"})).to_schema().unwrap();
        let resp = response(r#"{"candidates":[{"content":{"parts":[{"text":"```json\n{\"x\": true}\n```"}]}}]}"#);

        let parsed = adapter.parse_response(&resp, Some(&schema)).unwrap();
        assert_eq!(parsed.content, Content::Structured(json!({"x": true})));
    }

    #[test]
    fn status_codes_classify() {
        let adapter = GoogleAdapter::default();
        let exhausted = VendorError::from_response(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        let denied = VendorError::from_response(
            StatusCode::FORBIDDEN,
            r#"{"error":{"code":403,"message":"Permission denied","status":"PERMISSION_DENIED"}}"#,
        );

        assert_eq!(adapter.classify_error(&exhausted).category, ErrorCategory::RateLimit);
        assert_eq!(adapter.classify_error(&denied).category, ErrorCategory::Unrecoverable);
    }
}
