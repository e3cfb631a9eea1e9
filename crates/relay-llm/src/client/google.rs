//! Google Generative Language API client

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{decode_chunk, endpoint, post_json, send_json, sse_events};
use crate::convert::google::GoogleStreamState;
use crate::error::VendorError;
use crate::protocol::google::{GoogleRequest, GoogleResponse};
use crate::types::EventStream;

/// Default Google Generative Language API base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// `generateContent` transport
#[async_trait]
pub trait GoogleClient: Send + Sync {
    async fn generate_content(&self, model: &str, request: &GoogleRequest) -> Result<GoogleResponse, VendorError>;

    async fn stream_generate_content(&self, model: &str, request: &GoogleRequest)
    -> Result<EventStream, VendorError>;
}

/// HTTP client for the Gemini API
pub struct HttpGoogleClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpGoogleClient {
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

    fn post(&self, model: &str, method: &str, sse: bool) -> reqwest::RequestBuilder {
        let url = endpoint(&self.base_url, &format!("models/{model}:{method}"));
        let mut query = vec![("key", self.api_key.expose_secret())];
        if sse {
            query.push(("alt", "sse"));
        }
        self.client.post(url).query(&query)
    }
}

#[async_trait]
impl GoogleClient for HttpGoogleClient {
    async fn generate_content(&self, model: &str, request: &GoogleRequest) -> Result<GoogleResponse, VendorError> {
        post_json(self.post(model, "generateContent", false), request).await
    }

    async fn stream_generate_content(
        &self,
        model: &str,
        request: &GoogleRequest,
    ) -> Result<EventStream, VendorError> {
        let response = send_json(self.post(model, "streamGenerateContent", true), request).await?;
        let mut state = GoogleStreamState::new();

        Ok(sse_events(response, move |data| {
            Ok(decode_chunk::<GoogleResponse>(data)
                .map(|chunk| state.convert_chunk(&chunk))
                .unwrap_or_default())
        }))
    }
}
