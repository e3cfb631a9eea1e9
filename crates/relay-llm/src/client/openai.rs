//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{decode_chunk, endpoint, post_json, send_json, sse_events};
use crate::convert::openai::openai_chunk_to_events;
use crate::error::VendorError;
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamOptions};
use crate::types::{EventStream, StreamEvent};

/// Default `OpenAI` API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat completions transport
#[async_trait]
pub trait OpenAiClient: Send + Sync {
    async fn chat_completion(&self, request: &OpenAiRequest) -> Result<OpenAiResponse, VendorError>;

    async fn chat_completion_stream(&self, request: &OpenAiRequest) -> Result<EventStream, VendorError>;
}

/// Whether the base URL is the canonical `OpenAI` API (vs a compatible third party)
fn is_canonical_openai(base_url: &Url) -> bool {
    base_url.host_str().is_some_and(|h| h == "api.openai.com")
}

/// HTTP client for `OpenAI` and compatible APIs
pub struct HttpOpenAiClient {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl HttpOpenAiClient {
    /// # Panics
    ///
    /// Panics if the hardcoded default base URL is invalid (should never happen).
    pub fn new(base_url: Option<Url>, api_key: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL")),
            api_key,
        }
    }

    fn post(&self) -> reqwest::RequestBuilder {
        let builder = self.client.post(endpoint(&self.base_url, "chat/completions"));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl OpenAiClient for HttpOpenAiClient {
    async fn chat_completion(&self, request: &OpenAiRequest) -> Result<OpenAiResponse, VendorError> {
        post_json(self.post(), request).await
    }

    async fn chat_completion_stream(&self, request: &OpenAiRequest) -> Result<EventStream, VendorError> {
        let mut request = request.clone();
        request.stream = Some(true);

        // Compatible APIs often reject the unsupported parameter
        request.stream_options = is_canonical_openai(&self.base_url).then_some(OpenAiStreamOptions {
            include_usage: true,
        });

        let response = send_json(self.post(), &request).await?;

        Ok(sse_events(response, |data| {
            if data == "[DONE]" {
                return Ok(vec![StreamEvent::Done]);
            }
            Ok(decode_chunk::<OpenAiStreamChunk>(data)
                .map(|chunk| openai_chunk_to_events(&chunk))
                .unwrap_or_default())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_host_detection() {
        assert!(is_canonical_openai(&Url::parse(DEFAULT_BASE_URL).unwrap()));
        assert!(!is_canonical_openai(&Url::parse("http://127.0.0.1:8080/v1").unwrap()));
    }
}
