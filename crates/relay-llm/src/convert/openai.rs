//! Conversion of `OpenAI` stream chunks into normalized events

use crate::protocol::openai::{OpenAiStreamChunk, OpenAiUsage};
use crate::types::{StopReason, StreamEvent};

/// Convert an `OpenAI` stream chunk into internal stream events
pub fn openai_chunk_to_events(chunk: &OpenAiStreamChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    // Only the first choice is consumed; requests never ask for more
    if let Some(choice) = chunk.choices.iter().find(|c| c.index == 0) {
        if let Some(content) = choice.delta.content.as_ref().filter(|c| !c.is_empty()) {
            events.push(StreamEvent::Text(content.clone()));
        }

        for tool_call in choice.delta.tool_calls.iter().flatten() {
            let function = tool_call.function.as_ref();
            events.push(StreamEvent::ToolCallDelta {
                index: tool_call.index,
                id: tool_call.id.clone(),
                name: function.and_then(|f| f.name.clone()),
                arguments: function.and_then(|f| f.arguments.clone()),
            });
        }

        if let Some(reason) = &choice.finish_reason {
            events.push(StreamEvent::Finish(StopReason::parse(reason)));
        }
    }

    if let Some(usage) = &chunk.usage {
        events.push(usage_event(usage));
    }

    events
}

fn usage_event(usage: &OpenAiUsage) -> StreamEvent {
    StreamEvent::Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        reasoning_tokens: usage
            .completion_tokens_details
            .as_ref()
            .map_or(0, |d| d.reasoning_tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(json: &str) -> OpenAiStreamChunk {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn text_delta_becomes_text_event() {
        let events = openai_chunk_to_events(&chunk(r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#));
        assert_eq!(events, vec![StreamEvent::Text("Hel".to_owned())]);
    }

    #[test]
    fn tool_call_fragments_keep_their_index() {
        let events = openai_chunk_to_events(&chunk(
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[
                {"index":0,"id":"call_a","type":"function","function":{"name":"lookup","arguments":""}},
                {"index":1,"function":{"arguments":"{\"q\":"}}
            ]}}]}"#,
        ));
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            StreamEvent::ToolCallDelta { index: 0, id: Some(id), name: Some(name), .. } if id == "call_a" && name == "lookup"
        ));
        assert!(matches!(&events[1], StreamEvent::ToolCallDelta { index: 1, id: None, .. }));
    }

    #[test]
    fn finish_and_usage_are_reported() {
        let events = openai_chunk_to_events(&chunk(
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}],
                "usage":{"prompt_tokens":9,"completion_tokens":4,"total_tokens":13,
                         "completion_tokens_details":{"reasoning_tokens":2}}}"#,
        ));
        assert_eq!(
            events,
            vec![
                StreamEvent::Finish(StopReason::ToolCalls),
                StreamEvent::Usage {
                    input_tokens: 9,
                    output_tokens: 4,
                    reasoning_tokens: 2,
                },
            ]
        );
    }
}
