//! Configured providers
//!
//! A [`Provider`] pairs one adapter with its vendor client and default model.
//! The variant is selected once; after that the generic loops run with no
//! vendor branching.

use std::sync::Arc;

use relay_config::{ConfigError, ProviderConfig, ProviderType, SecretResolver, require_secret};

use crate::adapter::{Adapter, AnthropicAdapter, BedrockAdapter, GoogleAdapter, OpenAiAdapter};
use crate::client::{
    AnthropicClient, AwsCredentials, BedrockClient, GoogleClient, HttpAnthropicClient, HttpGoogleClient,
    HttpOpenAiClient, OpenAiClient, SdkBedrockClient,
};
use crate::error::LlmError;
use crate::operate::operate;
use crate::stream::{ChunkStream, stream};
use crate::types::{OperateInput, OperateRequest, OperateResponse};

/// An adapter bound to its client and default model
pub struct Binding<A: Adapter> {
    pub adapter: A,
    pub client: Arc<A::Client>,
    pub model: Option<String>,
}

impl<A: Adapter> Clone for Binding<A> {
    fn clone(&self) -> Self {
        Self {
            adapter: self.adapter.clone(),
            client: Arc::clone(&self.client),
            model: self.model.clone(),
        }
    }
}

impl<A: Adapter> Binding<A> {
    pub fn new(adapter: A, client: Arc<A::Client>, model: Option<String>) -> Self {
        Self { adapter, client, model }
    }

    async fn operate(&self, input: OperateInput, request: OperateRequest) -> Result<OperateResponse, LlmError> {
        operate(&self.adapter, &*self.client, self.model.as_deref(), input, request).await
    }

    fn stream(&self, input: OperateInput, request: OperateRequest) -> ChunkStream {
        stream(
            self.adapter.clone(),
            Arc::clone(&self.client),
            self.model.clone(),
            input,
            request,
        )
    }
}

/// One configured LLM vendor
#[derive(Clone)]
pub enum Provider {
    OpenAi(Binding<OpenAiAdapter>),
    Anthropic(Binding<AnthropicAdapter>),
    Google(Binding<GoogleAdapter>),
    Bedrock(Binding<BedrockAdapter>),
}

impl Provider {
    pub fn openai(client: Arc<dyn OpenAiClient>, model: Option<String>) -> Self {
        Self::OpenAi(Binding::new(OpenAiAdapter::default(), client, model))
    }

    pub fn anthropic(client: Arc<dyn AnthropicClient>, model: Option<String>) -> Self {
        Self::Anthropic(Binding::new(AnthropicAdapter::new(None), client, model))
    }

    pub fn google(client: Arc<dyn GoogleClient>, model: Option<String>) -> Self {
        Self::Google(Binding::new(GoogleAdapter::default(), client, model))
    }

    pub fn bedrock(client: Arc<dyn BedrockClient>, model: Option<String>) -> Self {
        Self::Bedrock(Binding::new(BedrockAdapter::default(), client, model))
    }

    /// Build a provider and its vendor client from configuration
    ///
    /// Credentials are resolved here, once, and held by the client.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Config` when a required secret cannot be resolved or
    /// a Bedrock provider has no region.
    pub async fn from_config(
        name: &str,
        config: &ProviderConfig,
        secrets: &dyn SecretResolver,
    ) -> Result<Self, LlmError> {
        let model = config.model.clone();
        let base_url = config.base_url.clone();

        let provider = match config.provider_type {
            ProviderType::Openai => {
                // Compatible servers behind a custom base URL often need no key
                let api_key = if base_url.is_some() {
                    secrets.get_secret(config.api_key_secret_name())
                } else {
                    Some(require_secret(secrets, name, config.api_key_secret_name())?)
                };
                let client: Arc<dyn OpenAiClient> = Arc::new(HttpOpenAiClient::new(base_url, api_key));
                Self::OpenAi(Binding::new(OpenAiAdapter::new(config.max_tokens), client, model))
            }
            ProviderType::Anthropic => {
                let api_key = require_secret(secrets, name, config.api_key_secret_name())?;
                let client: Arc<dyn AnthropicClient> = Arc::new(HttpAnthropicClient::new(base_url, api_key));
                Self::Anthropic(Binding::new(AnthropicAdapter::new(config.max_tokens), client, model))
            }
            ProviderType::Google => {
                let api_key = require_secret(secrets, name, config.api_key_secret_name())?;
                let client: Arc<dyn GoogleClient> = Arc::new(HttpGoogleClient::new(base_url, api_key));
                Self::Google(Binding::new(GoogleAdapter::new(config.max_tokens), client, model))
            }
            ProviderType::Bedrock => {
                let region = config.region.clone().ok_or_else(|| {
                    ConfigError::Invalid(format!("bedrock provider `{name}` requires a region"))
                })?;
                let credentials = aws_credentials(config, secrets);
                let client: Arc<dyn BedrockClient> = Arc::new(SdkBedrockClient::new(region, credentials).await);
                Self::Bedrock(Binding::new(BedrockAdapter::new(config.max_tokens), client, model))
            }
        };

        tracing::info!(provider = name, kind = config.provider_type.as_str(), "provider ready");
        Ok(provider)
    }

    /// Short vendor identifier
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OpenAi(binding) => binding.adapter.provider(),
            Self::Anthropic(binding) => binding.adapter.provider(),
            Self::Google(binding) => binding.adapter.provider(),
            Self::Bedrock(binding) => binding.adapter.provider(),
        }
    }

    /// Model used when a request names none
    pub fn default_model(&self) -> Option<&str> {
        match self {
            Self::OpenAi(binding) => binding.model.as_deref(),
            Self::Anthropic(binding) => binding.model.as_deref(),
            Self::Google(binding) => binding.model.as_deref(),
            Self::Bedrock(binding) => binding.model.as_deref(),
        }
    }

    /// Run the tool loop to completion
    ///
    /// # Errors
    ///
    /// See [`operate`](crate::operate::operate).
    pub async fn operate(
        &self,
        input: impl Into<OperateInput>,
        request: OperateRequest,
    ) -> Result<OperateResponse, LlmError> {
        let input = input.into();
        match self {
            Self::OpenAi(binding) => binding.operate(input, request).await,
            Self::Anthropic(binding) => binding.operate(input, request).await,
            Self::Google(binding) => binding.operate(input, request).await,
            Self::Bedrock(binding) => binding.operate(input, request).await,
        }
    }

    /// Run the tool loop as a chunk stream
    pub fn stream(&self, input: impl Into<OperateInput>, request: OperateRequest) -> ChunkStream {
        let input = input.into();
        match self {
            Self::OpenAi(binding) => binding.stream(input, request),
            Self::Anthropic(binding) => binding.stream(input, request),
            Self::Google(binding) => binding.stream(input, request),
            Self::Bedrock(binding) => binding.stream(input, request),
        }
    }
}

/// Static credentials, when both halves resolve; the default chain otherwise
fn aws_credentials(config: &ProviderConfig, secrets: &dyn SecretResolver) -> Option<AwsCredentials> {
    let access_key_id = secrets.get_secret(config.access_key_id_secret_name())?;
    let secret_access_key = secrets.get_secret(config.secret_access_key_secret_name())?;
    Some(AwsCredentials {
        access_key_id,
        secret_access_key,
    })
}

#[cfg(test)]
mod tests {
    use relay_config::StaticSecretResolver;
    use url::Url;

    use super::*;
    use crate::testing::{ScriptedOpenAi, openai_text};

    fn config(provider_type: ProviderType) -> ProviderConfig {
        ProviderConfig {
            provider_type,
            model: Some("test-model".to_owned()),
            api_key_secret: None,
            base_url: None,
            max_tokens: None,
            region: None,
            access_key_id_secret: None,
            secret_access_key_secret: None,
        }
    }

    #[tokio::test]
    async fn missing_key_is_a_config_error() {
        let err = Provider::from_config("claude", &config(ProviderType::Anthropic), &StaticSecretResolver::new())
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            LlmError::Config(ConfigError::MissingSecret { ref provider, ref name })
                if provider == "claude" && name == "ANTHROPIC_API_KEY"
        ));
    }

    #[tokio::test]
    async fn builds_from_resolved_secret() {
        let secrets = StaticSecretResolver::new().with_secret("GEMINI_API_KEY", "g-key");

        let provider = Provider::from_config("gemini", &config(ProviderType::Google), &secrets)
            .await
            .unwrap();

        assert_eq!(provider.kind(), "google");
        assert_eq!(provider.default_model(), Some("test-model"));
    }

    #[tokio::test]
    async fn openai_compatible_base_url_needs_no_key() {
        let mut config = config(ProviderType::Openai);
        config.base_url = Some(Url::parse("http://localhost:11434/v1").unwrap());

        let provider = Provider::from_config("local", &config, &StaticSecretResolver::new())
            .await
            .unwrap();

        assert_eq!(provider.kind(), "openai");
    }

    #[tokio::test]
    async fn bedrock_without_region_is_rejected() {
        let err = Provider::from_config("aws", &config(ProviderType::Bedrock), &StaticSecretResolver::new())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, LlmError::Config(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn operate_uses_configured_model() {
        let client = Arc::new(ScriptedOpenAi::new(vec![Ok(openai_text("Hi there"))]));
        let provider = Provider::openai(client.clone(), Some("gpt-4o-mini".to_owned()));

        let result = provider.operate("Hello", OperateRequest::new()).await.unwrap();

        assert_eq!(result.content.as_text(), Some("Hi there"));
        assert_eq!(client.requests()[0].model, "gpt-4o-mini");
    }
}
