//! Tool registry
//!
//! A [`Toolkit`] maps tool names to async implementations. It holds no state
//! besides that table, so one instance can serve any number of calls.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::{LlmError, ToolError};
use crate::format::{OutputSchema, STRUCTURED_OUTPUT_TOOL};
use crate::types::ToolCall;

/// Narration field added to every tool schema in explain mode
pub const EXPLANATION_FIELD: &str = "__Explanation";

/// Future returned by a tool implementation
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>;

type ToolFn = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

/// A callable tool
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
    call: ToolFn,
}

impl Tool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, parameters: Value, call: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            call: Arc::new(move |args| Box::pin(call(args))),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Vendor-agnostic tool definition handed to adapters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Name-keyed registry of tools
#[derive(Debug, Clone, Default)]
pub struct Toolkit {
    tools: IndexMap<String, Tool>,
    explain: bool,
}

impl Toolkit {
    /// Build a registry
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate names or the reserved `structured_output` name
    pub fn new(tools: impl IntoIterator<Item = Tool>) -> Result<Self, LlmError> {
        let mut registry = IndexMap::new();

        for tool in tools {
            if tool.name == STRUCTURED_OUTPUT_TOOL {
                return Err(LlmError::InvalidRequest(format!(
                    "tool name `{STRUCTURED_OUTPUT_TOOL}` is reserved"
                )));
            }
            if registry.contains_key(&tool.name) {
                return Err(LlmError::InvalidRequest(format!("duplicate tool name `{}`", tool.name)));
            }
            registry.insert(tool.name.clone(), tool);
        }

        Ok(Self {
            tools: registry,
            explain: false,
        })
    }

    /// Ask the model to narrate each call in an `__Explanation` field
    #[must_use]
    pub const fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Definitions to send to the model
    ///
    /// When `schema` is given the synthetic `structured_output` tool is
    /// appended with the requested schema as its parameters.
    pub fn definitions(&self, schema: Option<&OutputSchema>) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: if self.explain {
                    with_explanation(&tool.parameters)
                } else {
                    tool.parameters.clone()
                },
            })
            .collect();

        if let Some(schema) = schema {
            definitions.push(ToolDefinition {
                name: schema.name().to_owned(),
                description: "Respond with the final answer using this schema".to_owned(),
                parameters: schema.schema.clone(),
            });
        }

        definitions
    }

    /// Run a tool call and return its JSON-encoded result
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown names, `InvalidArguments` when the
    /// arguments are not a JSON object, and the tool's own error unchanged
    pub async fn call(&self, call: &ToolCall) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let mut arguments = parse_arguments(&call.name, &call.arguments)?;
        if let Value::Object(map) = &mut arguments {
            map.remove(EXPLANATION_FIELD);
        }

        let result = (tool.call)(arguments).await?;
        Ok(serde_json::to_string(&result)?)
    }
}

fn parse_arguments(name: &str, raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(ToolError::InvalidArguments {
            name: name.to_owned(),
            message: format!("expected a JSON object, got {other}"),
        }),
        Err(e) => Err(ToolError::InvalidArguments {
            name: name.to_owned(),
            message: e.to_string(),
        }),
    }
}

fn with_explanation(parameters: &Value) -> Value {
    let mut schema = parameters.clone();
    let Value::Object(map) = &mut schema else {
        return schema;
    };

    let properties = map
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(properties) = properties {
        properties.insert(
            EXPLANATION_FIELD.to_owned(),
            json!({
                "type": "string",
                "description": "Explain why you are calling this tool"
            }),
        );
    }

    schema
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::format::OutputFormat;

    fn echo() -> Tool {
        Tool::new(
            "echo",
            "Echo the arguments back",
            json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]}),
            |args| async move { Ok(args) },
        )
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_owned(),
            name: name.to_owned(),
            arguments: arguments.to_owned(),
        }
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Toolkit::new([echo(), echo()]).unwrap_err();
        assert!(err.to_string().contains("duplicate tool name"));
    }

    #[test]
    fn rejects_reserved_name() {
        let tool = Tool::new(STRUCTURED_OUTPUT_TOOL, "", json!({}), |_| async { Ok(Value::Null) });
        assert!(Toolkit::new([tool]).is_err());
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let toolkit = Toolkit::new([echo()]).unwrap();
        let output = toolkit.call(&call("echo", r#"{"text":"hi"}"#)).await.unwrap();
        assert_eq!(output, r#"{"text":"hi"}"#);
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let toolkit = Toolkit::new([echo()]).unwrap();
        let err = toolkit.call(&call("missing", "{}")).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn malformed_arguments_are_rejected() {
        let toolkit = Toolkit::new([echo()]).unwrap();
        let err = toolkit.call(&call("echo", "{not json")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn tool_errors_propagate_unchanged() {
        let failing = Tool::new("fail", "", json!({}), |_| async { Err(ToolError::execution("disk full")) });
        let toolkit = Toolkit::new([failing]).unwrap();
        let err = toolkit.call(&call("fail", "{}")).await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test]
    async fn explanation_is_advertised_but_stripped_before_calling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let tool = Tool::new("count", "", json!({"type": "object", "properties": {}}), move |args| {
            let seen = Arc::clone(&seen);
            async move {
                assert!(args.get(EXPLANATION_FIELD).is_none());
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(json!(1))
            }
        });
        let toolkit = Toolkit::new([tool]).unwrap().with_explain(true);

        let definitions = toolkit.definitions(None);
        assert!(definitions[0].parameters["properties"].get(EXPLANATION_FIELD).is_some());
        assert!(
            !definitions[0].parameters["required"]
                .as_array()
                .is_some_and(|required| required.iter().any(|r| r == EXPLANATION_FIELD))
        );

        toolkit
            .call(&call("count", r#"{"__Explanation":"because"}"#))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn structured_output_tool_is_appended_only_with_schema() {
        let toolkit = Toolkit::new([echo()]).unwrap();
        assert_eq!(toolkit.definitions(None).len(), 1);

        let schema = OutputFormat::Fields(json!({"answer": "string"})).to_schema().unwrap();
        let definitions = toolkit.definitions(Some(&schema));
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[1].name, STRUCTURED_OUTPUT_TOOL);
        assert_eq!(definitions[1].parameters, schema.schema);
    }
}
