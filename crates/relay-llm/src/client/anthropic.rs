//! Anthropic Messages API client

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{decode_chunk, endpoint, post_json, send_json, sse_events};
use crate::convert::anthropic::AnthropicStreamState;
use crate::error::VendorError;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse, AnthropicStreamEvent};
use crate::types::EventStream;

/// Default Anthropic API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API transport
#[async_trait]
pub trait AnthropicClient: Send + Sync {
    async fn create_message(&self, request: &AnthropicRequest) -> Result<AnthropicResponse, VendorError>;

    async fn create_message_stream(&self, request: &AnthropicRequest) -> Result<EventStream, VendorError>;
}

/// HTTP client for the Anthropic Messages API
pub struct HttpAnthropicClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpAnthropicClient {
    /// # Panics
    ///
    /// Panics if the hardcoded default base URL is invalid (should never happen).
    pub fn new(base_url: Option<Url>, api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL")),
            api_key,
        }
    }

    fn post(&self) -> reqwest::RequestBuilder {
        self.client
            .post(endpoint(&self.base_url, "messages"))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("x-api-key", self.api_key.expose_secret())
    }
}

#[async_trait]
impl AnthropicClient for HttpAnthropicClient {
    async fn create_message(&self, request: &AnthropicRequest) -> Result<AnthropicResponse, VendorError> {
        post_json(self.post(), request).await
    }

    async fn create_message_stream(&self, request: &AnthropicRequest) -> Result<EventStream, VendorError> {
        let mut request = request.clone();
        request.stream = Some(true);

        let response = send_json(self.post(), &request).await?;
        let mut state = AnthropicStreamState::new();

        Ok(sse_events(response, move |data| {
            if data.is_empty() {
                return Ok(Vec::new());
            }
            match decode_chunk::<AnthropicStreamEvent>(data) {
                Some(event) => state.convert_event(event),
                None => Ok(Vec::new()),
            }
        }))
    }
}
