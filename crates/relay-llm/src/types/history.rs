use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Author of a conversational message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in a conversation history
///
/// Histories are append-only within a call. Every `FunctionCallOutput` refers
/// to an earlier `FunctionCall` through `call_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryItem {
    /// User or assistant text
    Message { role: Role, content: String },
    /// Tool invocation requested by the model
    FunctionCall {
        name: String,
        /// JSON-encoded arguments
        arguments: String,
        call_id: String,
    },
    /// Result of running a tool
    FunctionCallOutput {
        call_id: String,
        name: String,
        /// JSON-encoded tool result
        output: String,
    },
}

impl HistoryItem {
    pub fn user(content: impl Into<String>) -> Self {
        Self::Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Text of a message item
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message { content, .. } => Some(content),
            _ => None,
        }
    }

    pub const fn is_user_message(&self) -> bool {
        matches!(self, Self::Message { role: Role::User, .. })
    }
}

/// Check that every function output follows its function call
pub fn validate_history(history: &[HistoryItem]) -> Result<(), LlmError> {
    let mut seen = HashSet::new();

    for item in history {
        match item {
            HistoryItem::FunctionCall { call_id, .. } => {
                seen.insert(call_id.as_str());
            }
            HistoryItem::FunctionCallOutput { call_id, .. } if !seen.contains(call_id.as_str()) => {
                return Err(LlmError::InvalidRequest(format!(
                    "function call output `{call_id}` has no preceding function call"
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let item = HistoryItem::FunctionCall {
            name: "lookup".to_owned(),
            arguments: "{}".to_owned(),
            call_id: "call_1".to_owned(),
        };
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"type": "function_call", "name": "lookup", "arguments": "{}", "call_id": "call_1"})
        );
        assert_eq!(
            serde_json::to_value(HistoryItem::user("hi")).unwrap(),
            json!({"type": "message", "role": "user", "content": "hi"})
        );
    }

    #[test]
    fn accepts_matched_outputs() {
        let history = vec![
            HistoryItem::user("go"),
            HistoryItem::FunctionCall {
                name: "t".to_owned(),
                arguments: "{}".to_owned(),
                call_id: "a".to_owned(),
            },
            HistoryItem::FunctionCallOutput {
                call_id: "a".to_owned(),
                name: "t".to_owned(),
                output: "1".to_owned(),
            },
        ];
        assert!(validate_history(&history).is_ok());
    }

    #[test]
    fn rejects_orphan_output() {
        let history = vec![HistoryItem::FunctionCallOutput {
            call_id: "missing".to_owned(),
            name: "t".to_owned(),
            output: "1".to_owned(),
        }];
        let err = validate_history(&history).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
