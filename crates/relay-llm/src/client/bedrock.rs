//! AWS Bedrock Converse client

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use crate::convert::bedrock::{
    BedrockStreamState, converse_response, inference_config, messages, sdk_error, system_blocks, tool_config,
    value_to_document,
};
use crate::error::VendorError;
use crate::protocol::bedrock::{ConverseRequest, ConverseResponse};
use crate::types::{EventStream, StreamEvent};

/// Converse transport
#[async_trait]
pub trait BedrockClient: Send + Sync {
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse, VendorError>;

    async fn converse_stream(&self, request: &ConverseRequest) -> Result<EventStream, VendorError>;
}

/// Static AWS credentials
pub struct AwsCredentials {
    pub access_key_id: SecretString,
    pub secret_access_key: SecretString,
}

/// Bedrock runtime client backed by the AWS SDK
pub struct SdkBedrockClient {
    client: Client,
}

impl SdkBedrockClient {
    /// Build a runtime client for a region
    ///
    /// Explicit credentials win; without them the default AWS provider chain
    /// is used.
    pub async fn new(region: String, credentials: Option<AwsCredentials>) -> Self {
        let mut loader =
            aws_config::defaults(aws_config::BehaviorVersion::latest()).region(aws_config::Region::new(region));

        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                credentials.access_key_id.expose_secret(),
                credentials.secret_access_key.expose_secret(),
                None,
                None,
                "relay-config",
            ));
        }

        let config = loader.load().await;
        Self {
            client: Client::new(&config),
        }
    }
}

#[async_trait]
impl BedrockClient for SdkBedrockClient {
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse, VendorError> {
        let output = self
            .client
            .converse()
            .model_id(&request.model_id)
            .set_system(Some(system_blocks(request)))
            .set_messages(Some(messages(request)?))
            .inference_config(inference_config(request))
            .set_tool_config(tool_config(request)?)
            .set_additional_model_request_fields(request.additional_model_request_fields.as_ref().map(value_to_document))
            .send()
            .await
            .map_err(|e| {
                let error = sdk_error(&e);
                tracing::warn!(error = %error, "bedrock converse failed");
                error
            })?;

        Ok(converse_response(&output))
    }

    async fn converse_stream(&self, request: &ConverseRequest) -> Result<EventStream, VendorError> {
        let output = self
            .client
            .converse_stream()
            .model_id(&request.model_id)
            .set_system(Some(system_blocks(request)))
            .set_messages(Some(messages(request)?))
            .inference_config(inference_config(request))
            .set_tool_config(tool_config(request)?)
            .set_additional_model_request_fields(request.additional_model_request_fields.as_ref().map(value_to_document))
            .send()
            .await
            .map_err(|e| {
                let error = sdk_error(&e);
                tracing::warn!(error = %error, "bedrock converse_stream failed");
                error
            })?;

        let events = futures_util::stream::unfold(
            Some((output.stream, BedrockStreamState::new())),
            |state| async move {
                let (mut receiver, mut converter) = state?;
                match receiver.recv().await {
                    Ok(Some(event)) => {
                        let events: Vec<Result<StreamEvent, VendorError>> =
                            converter.convert_event(&event).into_iter().map(Ok).collect();
                        Some((events, Some((receiver, converter))))
                    }
                    Ok(None) => None,
                    Err(e) => Some((vec![Err(sdk_error(&e))], None)),
                }
            },
        )
        .flat_map(futures_util::stream::iter);

        Ok(Box::pin(events))
    }
}
