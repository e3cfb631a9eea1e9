//! Structured output formats
//!
//! Callers describe the answer they want as a JSON schema, a natural field
//! map, or a Rust type. All three normalize to one [`OutputSchema`].

use schemars::JsonSchema;
use serde_json::{Map, Value, json};

use crate::error::LlmError;

/// Name of the synthetic tool used for structured output
pub const STRUCTURED_OUTPUT_TOOL: &str = "structured_output";

/// Requested shape of the model's answer
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    /// A JSON-schema object
    JsonSchema(Value),
    /// Field map such as `{"name": "string", "tags": ["string"]}`
    Fields(Value),
}

impl OutputFormat {
    /// Schema derived from a Rust type
    ///
    /// # Errors
    ///
    /// Returns an error if the generated schema cannot be represented as JSON
    pub fn of<T: JsonSchema>() -> Result<Self, LlmError> {
        let mut schema = serde_json::to_value(schemars::schema_for!(T))
            .map_err(|e| LlmError::InvalidRequest(format!("unrepresentable output schema: {e}")))?;
        if let Value::Object(map) = &mut schema {
            map.remove("$schema");
        }
        Ok(Self::JsonSchema(schema))
    }

    /// Normalize into a JSON schema
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is not an object or the field map uses
    /// an unsupported type
    pub fn to_schema(&self) -> Result<OutputSchema, LlmError> {
        let schema = match self {
            Self::JsonSchema(schema @ Value::Object(_)) => schema.clone(),
            Self::JsonSchema(_) => {
                return Err(LlmError::InvalidRequest("output schema must be a JSON object".to_owned()));
            }
            Self::Fields(fields) => field_schema(fields)?,
        };

        Ok(OutputSchema { schema })
    }
}

/// Vendor-agnostic JSON schema for structured output
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub schema: Value,
}

impl OutputSchema {
    pub const fn name(&self) -> &'static str {
        STRUCTURED_OUTPUT_TOOL
    }
}

fn field_schema(field: &Value) -> Result<Value, LlmError> {
    match field {
        Value::String(kind) => match kind.as_str() {
            "string" | "number" | "integer" | "boolean" => Ok(json!({ "type": kind })),
            other => Err(LlmError::InvalidRequest(format!("unsupported field type `{other}`"))),
        },
        Value::Array(items) => match items.as_slice() {
            [item] => Ok(json!({ "type": "array", "items": field_schema(item)? })),
            _ => Err(LlmError::InvalidRequest(
                "array fields must list exactly one item type".to_owned(),
            )),
        },
        Value::Object(fields) => {
            let mut properties = Map::new();
            for (name, kind) in fields {
                properties.insert(name.clone(), field_schema(kind)?);
            }
            let required: Vec<&String> = fields.keys().collect();
            Ok(json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }))
        }
        other => Err(LlmError::InvalidRequest(format!("unsupported field description `{other}`"))),
    }
}

/// Parse a model's text answer as JSON, tolerating a Markdown code fence
///
/// # Errors
///
/// Returns `LlmError::StructuredOutput` when the text is not valid JSON
pub fn parse_structured(text: &str) -> Result<Value, LlmError> {
    let body = strip_code_fence(text);
    serde_json::from_str(body).map_err(|e| LlmError::StructuredOutput(format!("answer is not valid JSON: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. `json`) up to the first newline
    let inner = match inner.find('\n') {
        Some(newline) if !inner[..newline].trim_start().starts_with(['{', '[']) => &inner[newline + 1..],
        _ => inner,
    };
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Weather {
        city: String,
        celsius: f64,
    }

    #[test]
    fn fenced_plain_and_padded_json_parse_identically() {
        let expected = json!({"city": "Oslo", "celsius": 4});
        let variants = [
            "{\"city\": \"Oslo\", \"celsius\": 4}",
            "```json\n{\"city\": \"Oslo\", \"celsius\": 4}\n```",
            "```\n{\"city\": \"Oslo\", \"celsius\": 4}\n```",
            "  \n```json\n  {\"city\": \"Oslo\", \"celsius\": 4}  \n```\n\n",
        ];
        for text in variants {
            assert_eq!(parse_structured(text).unwrap(), expected, "failed for {text:?}");
        }
    }

    #[test]
    fn invalid_json_is_a_structured_output_error() {
        assert!(matches!(parse_structured("sunny"), Err(LlmError::StructuredOutput(_))));
    }

    #[test]
    fn field_map_becomes_strict_object_schema() {
        let format = OutputFormat::Fields(json!({"name": "string", "tags": ["string"], "meta": {"age": "integer"}}));
        let schema = format.to_schema().unwrap().schema;
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["tags"], json!({"type": "array", "items": {"type": "string"}}));
        assert_eq!(schema["properties"]["meta"]["properties"]["age"], json!({"type": "integer"}));
        assert_eq!(schema["required"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn field_map_rejects_unknown_types() {
        assert!(OutputFormat::Fields(json!({"when": "date"})).to_schema().is_err());
    }

    #[test]
    fn derived_schema_describes_type() {
        let schema = OutputFormat::of::<Weather>().unwrap().to_schema().unwrap().schema;
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].get("city").is_some());
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn non_object_schema_is_rejected() {
        assert!(OutputFormat::JsonSchema(json!("string")).to_schema().is_err());
    }
}
