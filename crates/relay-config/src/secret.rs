//! Credential resolution
//!
//! Providers ask a [`SecretResolver`] for their credentials exactly once, when
//! they are built, and keep the result for their lifetime.

use std::collections::HashMap;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Source of named secrets
pub trait SecretResolver: Send + Sync {
    /// Look up a secret by name
    fn get_secret(&self, name: &str) -> Option<SecretString>;
}

/// Resolves secrets from process environment variables
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretResolver;

impl SecretResolver for EnvSecretResolver {
    fn get_secret(&self, name: &str) -> Option<SecretString> {
        std::env::var(name)
            .ok()
            .filter(|value| !value.is_empty())
            .map(SecretString::from)
    }
}

/// Resolves secrets from an in-memory table
#[derive(Debug, Default)]
pub struct StaticSecretResolver {
    secrets: HashMap<String, SecretString>,
}

impl StaticSecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), SecretString::from(value.into()));
        self
    }
}

impl SecretResolver for StaticSecretResolver {
    fn get_secret(&self, name: &str) -> Option<SecretString> {
        self.secrets.get(name).cloned()
    }
}

/// Resolve a secret or fail with a configuration error naming the provider
pub fn require_secret(resolver: &dyn SecretResolver, provider: &str, name: &str) -> Result<SecretString, ConfigError> {
    resolver.get_secret(name).ok_or_else(|| {
        tracing::error!(provider, secret = name, "credential not found");
        ConfigError::MissingSecret {
            provider: provider.to_owned(),
            name: name.to_owned(),
        }
    })
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn env_resolver_reads_variables() {
        temp_env::with_var("RELAY_TEST_KEY", Some("sk-123"), || {
            let secret = EnvSecretResolver.get_secret("RELAY_TEST_KEY").unwrap();
            assert_eq!(secret.expose_secret(), "sk-123");
        });
    }

    #[test]
    fn env_resolver_treats_empty_as_absent() {
        temp_env::with_var("RELAY_TEST_KEY", Some(""), || {
            assert!(EnvSecretResolver.get_secret("RELAY_TEST_KEY").is_none());
        });
    }

    #[test]
    fn require_secret_reports_provider_and_name() {
        let resolver = StaticSecretResolver::new();
        let err = require_secret(&resolver, "claude", "ANTHROPIC_API_KEY").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingSecret { ref provider, ref name }
                if provider == "claude" && name == "ANTHROPIC_API_KEY"
        ));
    }

    #[test]
    fn static_resolver_returns_registered_secrets() {
        let resolver = StaticSecretResolver::new().with_secret("A", "1");
        let secret = require_secret(&resolver, "p", "A").unwrap();
        assert_eq!(secret.expose_secret(), "1");
    }
}
