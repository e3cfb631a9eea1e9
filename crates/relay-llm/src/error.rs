use std::sync::OnceLock;

use http::StatusCode;
use regex::Regex;
use relay_config::ConfigError;
use thiserror::Error;

use crate::classify::ErrorClassification;

/// Errors that can end an operate or stream call
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider could not be built from configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Vendor signaled quota exhaustion; the caller decides when to try again
    #[error("{provider} rate limit exceeded")]
    RateLimited {
        provider: String,
        /// Back-off suggested by the classifier
        retry_after_ms: Option<u64>,
        #[source]
        source: VendorError,
    },

    /// Vendor call failed and was not (or no longer) retried
    #[error("{provider} request failed: {source}")]
    Vendor {
        provider: String,
        classification: ErrorClassification,
        #[source]
        source: VendorError,
    },

    /// A tool implementation failed
    #[error("tool `{name}` failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: ToolError,
    },

    /// Caller supplied an unusable request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Structured output was requested but the model's answer could not be parsed
    #[error("structured output error: {0}")]
    StructuredOutput(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// HTTP status a transport should answer with
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Tool { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Vendor { .. } | Self::StructuredOutput(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable error type
    pub const fn error_type(&self) -> &str {
        match self {
            Self::Config(_) => "configuration_error",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::Vendor { .. } => "upstream_error",
            Self::Tool { .. } => "tool_error",
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::StructuredOutput(_) => "structured_output_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show to an end user
    pub fn client_message(&self) -> String {
        match self {
            Self::Config(_) | Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

/// Failure reported by a vendor client
///
/// Every vendor client maps its transport and SDK errors into this one shape,
/// so classification only ever inspects plain data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VendorError {
    /// Vendor answered with a non-success HTTP status
    #[error("provider returned {status}: {message}")]
    Status {
        status: StatusCode,
        /// Vendor error code or type, when the body carried one
        code: Option<String>,
        message: String,
    },

    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request or read timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// SDK-modeled service exception (e.g. `ThrottlingException`)
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl VendorError {
    /// Build a status error from a vendor error body
    ///
    /// Understands the `{"error": {"type"|"code"|"status", "message"}}` bodies
    /// the HTTP vendors return and falls back to the raw body text.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let detail = parsed.as_ref().and_then(|value| value.get("error"));

        let code = detail
            .and_then(|error| {
                ["type", "code", "status"]
                    .iter()
                    .find_map(|key| error.get(*key).and_then(serde_json::Value::as_str))
            })
            .map(ToOwned::to_owned);

        let message = detail
            .and_then(|error| error.get("message"))
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| body.trim().to_owned(), ToOwned::to_owned);

        Self::Status { status, code, message }
    }

    /// Vendor error code, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            Self::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the error text mentions quota or rate limiting
    pub fn mentions_rate_limit(&self) -> bool {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"(?i)rate[\s_-]?limit|quota|too many requests|throttl").expect("must be valid regex")
        });
        re.is_match(&self.to_string()) || self.code().is_some_and(|code| re.is_match(code))
    }
}

impl From<reqwest::Error> for VendorError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else if error.is_decode() || error.is_body() {
            Self::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Status {
                status,
                code: None,
                message: error.to_string(),
            }
        } else {
            Self::Other(error.to_string())
        }
    }
}

/// Errors produced by tools or by dispatching to them
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool with this name is registered
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Arguments were not a JSON object the tool accepts
    #[error("invalid arguments for `{name}`: {message}")]
    InvalidArguments { name: String, message: String },

    /// The tool ran and failed
    #[error("{0}")]
    Execution(String),

    /// The tool's result could not be serialized
    #[error("failed to serialize tool result: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// Wrap any displayable failure as an execution error
    pub fn execution(error: impl std::fmt::Display) -> Self {
        Self::Execution(error.to_string())
    }
}
