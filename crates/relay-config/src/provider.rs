use serde::Deserialize;
use url::Url;

/// Configuration for a single LLM provider
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Vendor protocol spoken by this provider
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Model used when a request does not name one
    #[serde(default)]
    pub model: Option<String>,
    /// Name of the secret holding the API key (vendor default when absent)
    #[serde(default)]
    pub api_key_secret: Option<String>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Output token cap sent to vendors that require one
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// AWS region (Bedrock only)
    #[serde(default)]
    pub region: Option<String>,
    /// Secret name for the AWS access key id (Bedrock only)
    #[serde(default)]
    pub access_key_id_secret: Option<String>,
    /// Secret name for the AWS secret access key (Bedrock only)
    #[serde(default)]
    pub secret_access_key_secret: Option<String>,
}

/// Supported vendor protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// `OpenAI` chat completions
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Google,
    /// AWS Bedrock Converse API
    Bedrock,
}

impl ProviderType {
    /// Secret consulted for the API key when the config names none
    pub const fn default_api_key_secret(self) -> &'static str {
        match self {
            Self::Openai => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Google => "GEMINI_API_KEY",
            Self::Bedrock => "AWS_SECRET_ACCESS_KEY",
        }
    }

    /// Short identifier used in usage records and logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Bedrock => "bedrock",
        }
    }
}

impl ProviderConfig {
    /// Secret name holding this provider's API key
    pub fn api_key_secret_name(&self) -> &str {
        self.api_key_secret
            .as_deref()
            .unwrap_or_else(|| self.provider_type.default_api_key_secret())
    }

    /// Secret name holding the AWS access key id
    pub fn access_key_id_secret_name(&self) -> &str {
        self.access_key_id_secret.as_deref().unwrap_or("AWS_ACCESS_KEY_ID")
    }

    /// Secret name holding the AWS secret access key
    pub fn secret_access_key_secret_name(&self) -> &str {
        self.secret_access_key_secret
            .as_deref()
            .unwrap_or("AWS_SECRET_ACCESS_KEY")
    }
}
