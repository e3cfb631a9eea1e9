//! Conversion between Converse shapes and AWS SDK types

use std::collections::HashMap;

use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::operation::converse::ConverseOutput;
use aws_sdk_bedrockruntime::types::{
    AnyToolChoice, AutoToolChoice, ContentBlock, ContentBlockDelta, ContentBlockStart, ConversationRole,
    ConverseOutput as SdkConverseOutput, ConverseStreamOutput, InferenceConfiguration, Message, SpecificToolChoice,
    SystemContentBlock, TokenUsage, Tool, ToolChoice, ToolConfiguration, ToolInputSchema, ToolResultBlock,
    ToolResultContentBlock, ToolSpecification, ToolUseBlock,
};
use aws_smithy_types::{Document, Number};
use serde_json::Value;

use crate::error::VendorError;
use crate::protocol::bedrock::{
    BedrockBlock, BedrockMessage, BedrockRole, BedrockToolChoice, BedrockUsage, ConverseRequest, ConverseResponse,
};
use crate::types::{StopReason, StreamEvent};

fn build_error(error: impl std::fmt::Display) -> VendorError {
    VendorError::Other(format!("invalid converse request: {error}"))
}

/// System prompt blocks
pub fn system_blocks(request: &ConverseRequest) -> Vec<SystemContentBlock> {
    request.system.iter().cloned().map(SystemContentBlock::Text).collect()
}

/// Conversation messages
///
/// # Errors
///
/// Returns an error if the SDK rejects a block
pub fn messages(request: &ConverseRequest) -> Result<Vec<Message>, VendorError> {
    request.messages.iter().map(message).collect()
}

fn message(message: &BedrockMessage) -> Result<Message, VendorError> {
    let role = match message.role {
        BedrockRole::User => ConversationRole::User,
        BedrockRole::Assistant => ConversationRole::Assistant,
    };

    let content = message
        .content
        .iter()
        .map(content_block)
        .collect::<Result<Vec<_>, _>>()?;

    Message::builder()
        .role(role)
        .set_content(Some(content))
        .build()
        .map_err(build_error)
}

fn content_block(block: &BedrockBlock) -> Result<ContentBlock, VendorError> {
    Ok(match block {
        BedrockBlock::Text(text) => ContentBlock::Text(text.clone()),
        BedrockBlock::ToolUse { id, name, input } => ContentBlock::ToolUse(
            ToolUseBlock::builder()
                .tool_use_id(id)
                .name(name)
                .input(value_to_document(input))
                .build()
                .map_err(build_error)?,
        ),
        BedrockBlock::ToolResult { id, content } => ContentBlock::ToolResult(
            ToolResultBlock::builder()
                .tool_use_id(id)
                .content(ToolResultContentBlock::Text(content.clone()))
                .build()
                .map_err(build_error)?,
        ),
    })
}

/// Tool configuration, or `None` when no tools are offered
///
/// # Errors
///
/// Returns an error if the SDK rejects a specification
pub fn tool_config(request: &ConverseRequest) -> Result<Option<ToolConfiguration>, VendorError> {
    if request.tools.is_empty() {
        return Ok(None);
    }

    let mut config = ToolConfiguration::builder();
    for tool in &request.tools {
        let spec = ToolSpecification::builder()
            .name(&tool.name)
            .description(&tool.description)
            .input_schema(ToolInputSchema::Json(value_to_document(&tool.input_schema)))
            .build()
            .map_err(build_error)?;
        config = config.tools(Tool::ToolSpec(spec));
    }

    if let Some(choice) = &request.tool_choice {
        config = config.tool_choice(match choice {
            BedrockToolChoice::Auto => ToolChoice::Auto(AutoToolChoice::builder().build()),
            BedrockToolChoice::Any => ToolChoice::Any(AnyToolChoice::builder().build()),
            BedrockToolChoice::Tool(name) => {
                ToolChoice::Tool(SpecificToolChoice::builder().name(name).build().map_err(build_error)?)
            }
        });
    }

    config.build().map(Some).map_err(build_error)
}

/// Inference parameters
pub fn inference_config(request: &ConverseRequest) -> InferenceConfiguration {
    let mut config = InferenceConfiguration::builder();

    if let Some(temperature) = request.temperature {
        config = config.temperature(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        config = config.max_tokens(i32::try_from(max_tokens).unwrap_or(i32::MAX));
    }

    config.build()
}

/// Convert an SDK converse output into the plain response shape
pub fn converse_response(output: &ConverseOutput) -> ConverseResponse {
    let content = match output.output() {
        Some(SdkConverseOutput::Message(message)) => message.content().iter().filter_map(response_block).collect(),
        _ => Vec::new(),
    };

    ConverseResponse {
        content,
        stop_reason: output.stop_reason().as_str().to_owned(),
        usage: output.usage().map(usage),
    }
}

fn response_block(block: &ContentBlock) -> Option<BedrockBlock> {
    match block {
        ContentBlock::Text(text) => Some(BedrockBlock::Text(text.clone())),
        ContentBlock::ToolUse(tool_use) => Some(BedrockBlock::ToolUse {
            id: tool_use.tool_use_id().to_owned(),
            name: tool_use.name().to_owned(),
            input: document_to_value(tool_use.input()),
        }),
        _ => None,
    }
}

fn usage(usage: &TokenUsage) -> BedrockUsage {
    let count = |n: i32| u64::try_from(n).unwrap_or(0);
    BedrockUsage {
        input_tokens: count(usage.input_tokens()),
        output_tokens: count(usage.output_tokens()),
        total_tokens: count(usage.total_tokens()),
    }
}

/// State tracker for converting Converse stream events
#[derive(Debug, Default)]
pub struct BedrockStreamState {
    current_tool_call_index: Option<u32>,
    next_tool_call_index: u32,
}

impl BedrockStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a Converse stream event to internal stream events
    pub fn convert_event(&mut self, event: &ConverseStreamOutput) -> Vec<StreamEvent> {
        match event {
            ConverseStreamOutput::ContentBlockStart(start) => match start.start() {
                Some(ContentBlockStart::ToolUse(tool)) => {
                    let index = self.next_tool_call_index;
                    self.next_tool_call_index += 1;
                    self.current_tool_call_index = Some(index);
                    vec![StreamEvent::ToolCallDelta {
                        index,
                        id: Some(tool.tool_use_id().to_owned()),
                        name: Some(tool.name().to_owned()),
                        arguments: None,
                    }]
                }
                _ => Vec::new(),
            },
            ConverseStreamOutput::ContentBlockDelta(delta) => match delta.delta() {
                Some(ContentBlockDelta::Text(text)) => vec![StreamEvent::Text(text.clone())],
                Some(ContentBlockDelta::ToolUse(tool)) => self
                    .current_tool_call_index
                    .map(|index| StreamEvent::ToolCallDelta {
                        index,
                        id: None,
                        name: None,
                        arguments: Some(tool.input().to_owned()),
                    })
                    .into_iter()
                    .collect(),
                _ => Vec::new(),
            },
            ConverseStreamOutput::ContentBlockStop(_) => {
                self.current_tool_call_index = None;
                Vec::new()
            }
            ConverseStreamOutput::MessageStop(stop) => {
                vec![StreamEvent::Finish(StopReason::parse(stop.stop_reason().as_str()))]
            }
            ConverseStreamOutput::Metadata(meta) => meta
                .usage()
                .map(|u| {
                    let u = usage(u);
                    StreamEvent::Usage {
                        input_tokens: u.input_tokens,
                        output_tokens: u.output_tokens,
                        reasoning_tokens: 0,
                    }
                })
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Map an SDK error onto the vendor error shape
///
/// Modeled service exceptions keep their exception name as the code, which
/// is what the Bedrock classifier matches on.
pub fn sdk_error<E, R>(error: &SdkError<E, R>) -> VendorError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match error {
        SdkError::ServiceError(context) => {
            let err = context.err();
            VendorError::Service {
                code: err.code().unwrap_or("UnknownError").to_owned(),
                message: err.message().unwrap_or_default().to_owned(),
            }
        }
        SdkError::TimeoutError(_) => VendorError::Timeout(DisplayErrorContext(error).to_string()),
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            VendorError::Timeout(DisplayErrorContext(error).to_string())
        }
        SdkError::DispatchFailure(_) => VendorError::Connect(DisplayErrorContext(error).to_string()),
        SdkError::ResponseError(_) => VendorError::Decode(DisplayErrorContext(error).to_string()),
        _ => VendorError::Other(DisplayErrorContext(error).to_string()),
    }
}

/// Convert a `serde_json::Value` to an AWS `Document`
pub fn value_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                n.as_f64().map_or(Document::Null, |f| Document::Number(Number::Float(f)))
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(value_to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_document(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

/// Convert an AWS `Document` to a `serde_json::Value`
pub fn document_to_value(doc: &Document) -> Value {
    match doc {
        Document::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), document_to_value(v))).collect()),
        Document::Array(items) => Value::Array(items.iter().map(document_to_value).collect()),
        Document::Number(Number::PosInt(u)) => Value::from(*u),
        Document::Number(Number::NegInt(i)) => Value::from(*i),
        Document::Number(Number::Float(f)) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Document::String(s) => Value::String(s.clone()),
        Document::Bool(b) => Value::Bool(*b),
        Document::Null => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_bedrockruntime::types::{
        ContentBlockDeltaEvent, ContentBlockStartEvent, MessageStopEvent, StopReason as SdkStopReason,
        ToolUseBlockDelta, ToolUseBlockStart,
    };
    use serde_json::json;

    use super::*;
    use crate::protocol::bedrock::BedrockToolSpec;

    #[test]
    fn documents_preserve_integer_and_nested_values() {
        let value = json!({"count": 3, "offset": -2, "ratio": 0.5, "tags": ["a"], "on": true, "none": null});
        assert_eq!(document_to_value(&value_to_document(&value)), value);
    }

    #[test]
    fn builds_messages_with_tool_blocks() {
        let request = ConverseRequest {
            model_id: "m".to_owned(),
            messages: vec![
                BedrockMessage {
                    role: BedrockRole::Assistant,
                    content: vec![BedrockBlock::ToolUse {
                        id: "t1".to_owned(),
                        name: "lookup".to_owned(),
                        input: json!({"q": "x"}),
                    }],
                },
                BedrockMessage {
                    role: BedrockRole::User,
                    content: vec![BedrockBlock::ToolResult {
                        id: "t1".to_owned(),
                        content: "\"ok\"".to_owned(),
                    }],
                },
            ],
            ..ConverseRequest::default()
        };

        let messages = messages(&request).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), &ConversationRole::Assistant);
        assert!(matches!(messages[1].content()[0], ContentBlock::ToolResult(_)));
    }

    #[test]
    fn tool_config_is_absent_without_tools() {
        assert!(tool_config(&ConverseRequest::default()).unwrap().is_none());

        let request = ConverseRequest {
            tools: vec![BedrockToolSpec {
                name: "structured_output".to_owned(),
                description: "answer".to_owned(),
                input_schema: json!({"type": "object"}),
            }],
            tool_choice: Some(BedrockToolChoice::Tool("structured_output".to_owned())),
            ..ConverseRequest::default()
        };
        let config = tool_config(&request).unwrap().unwrap();
        assert_eq!(config.tools().len(), 1);
        assert!(matches!(config.tool_choice(), Some(ToolChoice::Tool(_))));
    }

    #[test]
    fn stream_events_track_tool_indexes() {
        let mut state = BedrockStreamState::new();

        let start = ConverseStreamOutput::ContentBlockStart(
            ContentBlockStartEvent::builder()
                .content_block_index(1)
                .start(ContentBlockStart::ToolUse(
                    ToolUseBlockStart::builder()
                        .tool_use_id("t1")
                        .name("lookup")
                        .build()
                        .unwrap(),
                ))
                .build()
                .unwrap(),
        );
        let delta = ConverseStreamOutput::ContentBlockDelta(
            ContentBlockDeltaEvent::builder()
                .content_block_index(1)
                .delta(ContentBlockDelta::ToolUse(
                    ToolUseBlockDelta::builder().input("{\"q\":1}").build().unwrap(),
                ))
                .build()
                .unwrap(),
        );
        let stop = ConverseStreamOutput::MessageStop(
            MessageStopEvent::builder()
                .stop_reason(SdkStopReason::ToolUse)
                .build()
                .unwrap(),
        );

        assert!(matches!(
            &state.convert_event(&start)[0],
            StreamEvent::ToolCallDelta { index: 0, name: Some(n), .. } if n == "lookup"
        ));
        assert!(matches!(
            &state.convert_event(&delta)[0],
            StreamEvent::ToolCallDelta { index: 0, arguments: Some(a), .. } if a == "{\"q\":1}"
        ));
        assert_eq!(state.convert_event(&stop), vec![StreamEvent::Finish(StopReason::ToolCalls)]);
    }
}
