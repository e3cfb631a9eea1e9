use std::path::Path;

use crate::error::ConfigError;
use crate::{Config, ProviderType};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, expansion or parsing
    /// fails, or validation fails
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let expanded = crate::env::expand_env(raw)?;
        let config: Self = toml::from_str(&expanded)?;
        config.validate()?;

        tracing::debug!(providers = config.providers.len(), "configuration loaded");
        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured, the turn bound is zero,
    /// or a Bedrock provider lacks a region
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid("at least one provider must be configured".to_owned()));
        }

        if self.defaults.turns == 0 {
            return Err(ConfigError::Invalid("defaults.turns must be greater than 0".to_owned()));
        }

        for (name, provider) in &self.providers {
            if provider.provider_type == ProviderType::Bedrock && provider.region.is_none() {
                return Err(ConfigError::Invalid(format!("bedrock provider '{name}' requires a region")));
            }

            if provider.max_tokens == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "provider '{name}' max_tokens must be greater than 0"
                )));
            }
        }

        Ok(())
    }
}
