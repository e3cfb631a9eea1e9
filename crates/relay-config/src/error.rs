use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors
///
/// These fail fast and are never retried. They are deliberately kept apart
/// from vendor error classification.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A credential the provider needs could not be resolved
    #[error("missing secret `{name}` for provider `{provider}`")]
    MissingSecret { provider: String, name: String },

    /// The config file could not be read
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `{{ env.VAR }}` expansion failed
    #[error("config variable expansion failed: {0}")]
    Expansion(String),

    /// The expanded TOML could not be deserialized
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed but is not internally consistent
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
