//! Vendor clients
//!
//! Each vendor is reached through a small trait so adapters can be driven by
//! scripted clients in tests. The HTTP implementations share the helpers
//! below; Bedrock goes through the AWS SDK instead.

pub mod anthropic;
pub mod bedrock;
pub mod google;
pub mod openai;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

pub use self::anthropic::{AnthropicClient, HttpAnthropicClient};
pub use self::bedrock::{AwsCredentials, BedrockClient, SdkBedrockClient};
pub use self::google::{GoogleClient, HttpGoogleClient};
pub use self::openai::{HttpOpenAiClient, OpenAiClient};
use crate::error::VendorError;
use crate::types::{EventStream, StreamEvent};

/// Join an endpoint path onto a base URL, keeping any base path
pub(crate) fn endpoint(base_url: &Url, path: &str) -> String {
    let base = base_url.as_str().trim_end_matches('/');
    format!("{base}/{}", path.trim_start_matches('/'))
}

/// Send a JSON body and return the response if the vendor accepted it
pub(crate) async fn send_json<B: Serialize + Sync>(builder: RequestBuilder, body: &B) -> Result<Response, VendorError> {
    let response = builder.json(body).send().await?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, "vendor returned error");
    Err(VendorError::from_response(status, &body))
}

/// Send a JSON body and decode the JSON answer
pub(crate) async fn post_json<B, T>(builder: RequestBuilder, body: &B) -> Result<T, VendorError>
where
    B: Serialize + Sync,
    T: DeserializeOwned,
{
    let response = send_json(builder, body).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| VendorError::Decode(e.to_string()))
}

/// Turn a server-sent event response into normalized events
///
/// `convert` receives each event's trimmed data payload.
pub(crate) fn sse_events<F>(response: Response, mut convert: F) -> EventStream
where
    F: FnMut(&str) -> Result<Vec<StreamEvent>, VendorError> + Send + 'static,
{
    let events = response
        .bytes_stream()
        .eventsource()
        .map(move |result| match result {
            Ok(event) => match convert(event.data.trim()) {
                Ok(events) => events.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            },
            Err(e) => vec![Err(VendorError::Decode(e.to_string()))],
        })
        .flat_map(futures_util::stream::iter);

    Box::pin(events)
}

/// Decode one SSE payload, skipping chunks that do not parse
pub(crate) fn decode_chunk<T: DeserializeOwned>(data: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
            None
        }
    }
}
