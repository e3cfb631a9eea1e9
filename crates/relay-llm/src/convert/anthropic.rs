//! Conversion of Anthropic stream events into normalized events

use crate::error::VendorError;
use crate::protocol::anthropic::{AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent};
use crate::types::{StopReason, StreamEvent};

/// State tracker for converting Anthropic stream events
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    /// Sequential 0-based index of the tool call currently being streamed
    ///
    /// Anthropic's content block index is shared across all block types, so
    /// it cannot serve as the tool-call index.
    current_tool_call_index: Option<u32>,
    /// Counter used to assign the next tool call its sequential index
    next_tool_call_index: u32,
}

impl AnthropicStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert an Anthropic stream event to internal stream events
    ///
    /// # Errors
    ///
    /// Returns the vendor error carried by an `error` event
    pub fn convert_event(&mut self, event: AnthropicStreamEvent) -> Result<Vec<StreamEvent>, VendorError> {
        let events = match event {
            AnthropicStreamEvent::MessageStart { message } => message
                .usage
                .map(|usage| StreamEvent::Usage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    reasoning_tokens: 0,
                })
                .into_iter()
                .collect(),

            AnthropicStreamEvent::ContentBlockStart { content_block, .. } => match content_block {
                AnthropicStreamContentBlock::Text { text } if !text.is_empty() => vec![StreamEvent::Text(text)],
                AnthropicStreamContentBlock::ToolUse { id, name } => {
                    let index = self.next_tool_call_index;
                    self.next_tool_call_index += 1;
                    self.current_tool_call_index = Some(index);
                    vec![StreamEvent::ToolCallDelta {
                        index,
                        id: Some(id),
                        name: Some(name),
                        arguments: None,
                    }]
                }
                _ => Vec::new(),
            },

            AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                AnthropicStreamDelta::TextDelta { text } => vec![StreamEvent::Text(text)],
                AnthropicStreamDelta::InputJsonDelta { partial_json } => self
                    .current_tool_call_index
                    .map(|index| StreamEvent::ToolCallDelta {
                        index,
                        id: None,
                        name: None,
                        arguments: Some(partial_json),
                    })
                    .into_iter()
                    .collect(),
                AnthropicStreamDelta::Other => Vec::new(),
            },

            AnthropicStreamEvent::ContentBlockStop { .. } => {
                self.current_tool_call_index = None;
                Vec::new()
            }

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();
                if let Some(reason) = delta.stop_reason {
                    events.push(StreamEvent::Finish(StopReason::parse(&reason)));
                }
                if let Some(usage) = usage {
                    events.push(StreamEvent::Usage {
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                        reasoning_tokens: 0,
                    });
                }
                events
            }

            AnthropicStreamEvent::MessageStop => vec![StreamEvent::Done],
            AnthropicStreamEvent::Ping => Vec::new(),

            AnthropicStreamEvent::Error { error } => {
                return Err(VendorError::Service {
                    code: error.error_type,
                    message: error.message,
                });
            }
        };

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(state: &mut AnthropicStreamState, json: &str) -> Vec<StreamEvent> {
        state.convert_event(serde_json::from_str(json).unwrap()).unwrap()
    }

    #[test]
    fn tool_use_after_text_gets_index_zero() {
        let mut state = AnthropicStreamState::new();
        convert(&mut state, r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#);
        let text = convert(
            &mut state,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Let me check"}}"#,
        );
        assert_eq!(text, vec![StreamEvent::Text("Let me check".to_owned())]);
        convert(&mut state, r#"{"type":"content_block_stop","index":0}"#);

        let start = convert(
            &mut state,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"weather","input":{}}}"#,
        );
        assert!(matches!(&start[0], StreamEvent::ToolCallDelta { index: 0, id: Some(id), .. } if id == "toolu_1"));

        let args = convert(
            &mut state,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"city\":"}}"#,
        );
        assert!(matches!(&args[0], StreamEvent::ToolCallDelta { index: 0, arguments: Some(a), .. } if a == "{\"city\":"));
    }

    #[test]
    fn message_delta_reports_stop_reason_and_usage() {
        let mut state = AnthropicStreamState::new();
        let events = convert(
            &mut state,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":12}}"#,
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::Finish(StopReason::ToolCalls),
                StreamEvent::Usage {
                    input_tokens: 0,
                    output_tokens: 12,
                    reasoning_tokens: 0,
                },
            ]
        );
    }

    #[test]
    fn message_stop_is_done() {
        let mut state = AnthropicStreamState::new();
        assert_eq!(convert(&mut state, r#"{"type":"message_stop"}"#), vec![StreamEvent::Done]);
    }

    #[test]
    fn error_event_is_a_vendor_error() {
        let mut state = AnthropicStreamState::new();
        let event = serde_json::from_str(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .unwrap();
        let err = state.convert_event(event).unwrap_err();
        assert_eq!(err.code(), Some("overloaded_error"));
    }
}
