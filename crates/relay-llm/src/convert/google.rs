//! Conversion of Google stream chunks into normalized events

use crate::protocol::google::GoogleResponse;
use crate::types::{StopReason, StreamEvent, synthesize_call_id};

/// State tracker for Google streams
///
/// Google sends each function call whole and without an id, so every call
/// gets the next sequential index and a synthesized id.
#[derive(Debug, Default)]
pub struct GoogleStreamState {
    next_tool_call_index: u32,
}

impl GoogleStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a Google streaming chunk to internal stream events
    pub fn convert_chunk(&mut self, chunk: &GoogleResponse) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(candidate) = chunk.candidates.first() {
            for part in &candidate.content.parts {
                if part.thought == Some(true) {
                    continue;
                }

                if let Some(text) = part.text.as_ref().filter(|t| !t.is_empty()) {
                    events.push(StreamEvent::Text(text.clone()));
                }

                if let Some(call) = &part.function_call {
                    let index = self.next_tool_call_index;
                    self.next_tool_call_index += 1;
                    events.push(StreamEvent::ToolCallDelta {
                        index,
                        id: Some(synthesize_call_id()),
                        name: Some(call.name.clone()),
                        arguments: Some(call.args.to_string()),
                    });
                }
            }

            if let Some(reason) = &candidate.finish_reason {
                events.push(StreamEvent::Finish(StopReason::parse(reason)));
            }
        }

        if let Some(usage) = &chunk.usage_metadata {
            events.push(StreamEvent::Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count + usage.thoughts_token_count,
                reasoning_tokens: usage.thoughts_token_count,
            });
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_calls_get_sequential_indexes_and_ids() {
        let mut state = GoogleStreamState::new();
        let chunk: GoogleResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[
                {"functionCall":{"name":"a","args":{"x":1}}},
                {"functionCall":{"name":"b","args":{}}}
            ]}}]}"#,
        )
        .unwrap();

        let events = state.convert_chunk(&chunk);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            StreamEvent::ToolCallDelta { index: 0, id: Some(id), arguments: Some(args), .. }
                if id.starts_with("call_") && args == r#"{"x":1}"#
        ));
        assert!(matches!(&events[1], StreamEvent::ToolCallDelta { index: 1, .. }));
    }

    #[test]
    fn thoughts_are_skipped_and_counted_as_reasoning() {
        let mut state = GoogleStreamState::new();
        let chunk: GoogleResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"hmm","thought":true},{"text":"Hi"}]},"finishReason":"STOP"}],
                "usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":2,"thoughtsTokenCount":3,"totalTokenCount":10}}"#,
        )
        .unwrap();

        assert_eq!(
            state.convert_chunk(&chunk),
            vec![
                StreamEvent::Text("Hi".to_owned()),
                StreamEvent::Finish(StopReason::Stop),
                StreamEvent::Usage {
                    input_tokens: 5,
                    output_tokens: 5,
                    reasoning_tokens: 3,
                },
            ]
        );
    }
}
