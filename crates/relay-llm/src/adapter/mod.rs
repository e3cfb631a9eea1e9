//! Vendor adapters
//!
//! An [`Adapter`] translates the provider-neutral request into one vendor's
//! shape, runs it against an injected client, and reads the answer back. The
//! loops are generic over this trait and never branch on vendor identity.

mod anthropic;
mod bedrock;
mod google;
mod openai;

use std::future::Future;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

pub use self::anthropic::AnthropicAdapter;
pub use self::bedrock::BedrockAdapter;
pub use self::google::GoogleAdapter;
pub use self::openai::OpenAiAdapter;
use crate::classify::ErrorClassification;
use crate::error::{LlmError, VendorError};
use crate::format::{OutputSchema, STRUCTURED_OUTPUT_TOOL, parse_structured};
use crate::toolkit::Toolkit;
use crate::types::{Content, EventStream, HistoryItem, ParsedResponse, Role, StopReason, ToolCall, UsageItem};

/// Borrowed view of everything an adapter needs to build one vendor request
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub model: &'a str,
    pub history: &'a [HistoryItem],
    pub system: Option<&'a str>,
    /// Appended to the latest user message
    pub instructions: Option<&'a str>,
    pub toolkit: &'a Toolkit,
    pub schema: Option<&'a OutputSchema>,
    pub temperature: Option<f64>,
    /// Merged into the vendor request body
    pub provider_options: Option<&'a Value>,
}

/// Translation between the neutral model and one vendor
#[async_trait]
pub trait Adapter: Clone + Send + Sync + 'static {
    /// Injected vendor client
    type Client: ?Sized + Send + Sync + 'static;
    type Request: Send + Sync + 'static;
    type Response: Send + Sync + 'static;
    type ToolDef;
    type Message;

    /// Provider label recorded in usage and logs
    fn provider(&self) -> &'static str;

    /// Map a neutral request onto the vendor's request shape
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the request cannot be expressed
    fn build_request(&self, request: &ModelRequest<'_>) -> Result<Self::Request, LlmError>;

    /// Issue the request; `Ok(None)` means the call was cancelled
    async fn execute_request(
        &self,
        client: &Self::Client,
        request: &Self::Request,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<Self::Response>, VendorError>;

    /// Open a streaming call; `Ok(None)` means the call was cancelled
    async fn execute_stream(
        &self,
        client: &Self::Client,
        request: &Self::Request,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<EventStream>, VendorError>;

    /// Read assistant content out of a response
    ///
    /// # Errors
    ///
    /// Returns `StructuredOutput` when a structured answer is not valid JSON
    fn parse_response(
        &self,
        response: &Self::Response,
        schema: Option<&OutputSchema>,
    ) -> Result<ParsedResponse, LlmError> {
        let content = if self.has_structured_output(response, schema) {
            match self.extract_structured_output(response, schema)? {
                Some(value) => Content::Structured(value),
                None => Content::Text(self.response_text(response)),
            }
        } else {
            Content::Text(self.response_text(response))
        };

        Ok(ParsedResponse {
            content,
            has_tool_calls: !self.extract_tool_calls(response).is_empty(),
            stop_reason: self.stop_reason(response),
        })
    }

    /// Concatenated assistant text
    fn response_text(&self, response: &Self::Response) -> String;

    /// Vendor stop reason, normalized
    fn stop_reason(&self, response: &Self::Response) -> Option<StopReason>;

    fn extract_tool_calls(&self, response: &Self::Response) -> Vec<ToolCall>;

    /// Token counts; all zero when the vendor reported none
    fn extract_usage(&self, response: &Self::Response, model: &str) -> UsageItem;

    fn format_tools(&self, toolkit: &Toolkit, schema: Option<&OutputSchema>) -> Vec<Self::ToolDef>;

    /// Vendor message carrying one tool result
    fn format_tool_result(&self, call: &ToolCall, result: &str) -> Self::Message;

    /// Whether the vendor signaled that no tool calls are pending
    fn is_complete(&self, response: &Self::Response) -> bool;

    fn classify_error(&self, error: &VendorError) -> ErrorClassification;

    /// Whether this response answered through the structured-output path
    fn has_structured_output(&self, response: &Self::Response, schema: Option<&OutputSchema>) -> bool;

    /// The structured answer, when the structured-output path was used
    ///
    /// # Errors
    ///
    /// Returns `StructuredOutput` when the answer is not valid JSON
    fn extract_structured_output(
        &self,
        response: &Self::Response,
        schema: Option<&OutputSchema>,
    ) -> Result<Option<Value>, LlmError>;

    /// Whether the vendor constrains text answers to the schema
    ///
    /// With a schema set, such a vendor only ever answers in JSON, so text
    /// that fails to parse is an error rather than a plain answer.
    fn native_structured_output(&self) -> bool {
        false
    }

    /// Structured answer carried by a fully streamed turn
    ///
    /// Decides the same way [`parse_response`](Self::parse_response) does
    /// for a complete response: the synthetic tool wins, and a turn without
    /// tool calls is read as JSON text.
    fn streamed_structured_output(
        &self,
        text: &str,
        calls: &[ToolCall],
        schema: Option<&OutputSchema>,
    ) -> Option<Result<Value, LlmError>> {
        schema?;
        if let Some(result) = synthetic_structured_output(calls) {
            return Some(result);
        }
        if !calls.is_empty() {
            return None;
        }
        if self.native_structured_output() {
            Some(parse_structured(text))
        } else {
            parse_structured(text).ok().map(Ok)
        }
    }
}

/// Race a vendor call against the cancellation token
///
/// A token that is already triggered, or a failure observed after the token
/// fired, yields `Ok(None)`. Without cancellation the call's own result is
/// returned unchanged.
pub async fn cancellable<T, F>(signal: Option<&CancellationToken>, call: F) -> Result<Option<T>, VendorError>
where
    F: Future<Output = Result<T, VendorError>> + Send,
{
    let Some(token) = signal else {
        return call.await.map(Some);
    };

    if token.is_cancelled() {
        return Ok(None);
    }

    tokio::select! {
        biased;
        () = token.cancelled() => Ok(None),
        result = call => match result {
            Ok(value) => Ok(Some(value)),
            Err(error) if token.is_cancelled() => {
                tracing::debug!(error = %error, "vendor error after cancellation swallowed");
                Ok(None)
            }
            Err(error) => Err(error),
        },
    }
}

/// History with `instructions` appended to the latest user message
pub(crate) fn with_instructions(history: &[HistoryItem], instructions: Option<&str>) -> Vec<HistoryItem> {
    let mut items = history.to_vec();

    let Some(instructions) = instructions.filter(|i| !i.trim().is_empty()) else {
        return items;
    };

    let last_user = items.iter_mut().rev().find_map(|item| match item {
        HistoryItem::Message {
            role: Role::User,
            content,
        } => Some(content),
        _ => None,
    });

    match last_user {
        Some(content) => *content = format!("{content}\n\n{instructions}"),
        None => items.push(HistoryItem::user(instructions)),
    }

    items
}

/// Merge caller-supplied options into a request body's extra fields
pub(crate) fn merge_provider_options(extra: &mut Map<String, Value>, options: Option<&Value>) {
    if let Some(Value::Object(options)) = options {
        extra.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Tool-call arguments as a JSON value, `{}` when unparseable
pub(crate) fn arguments_value(arguments: &str) -> Value {
    match serde_json::from_str(arguments) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    }
}

/// Structured answer delivered through the synthetic tool, if the model used it
pub(crate) fn synthetic_structured_output(calls: &[ToolCall]) -> Option<Result<Value, LlmError>> {
    calls
        .iter()
        .find(|call| call.name == STRUCTURED_OUTPUT_TOOL)
        .map(|call| parse_structured(&call.arguments))
}
