//! Configuration for Relay
//!
//! Covers the TOML config file (with `{{ env.VAR }}` expansion), per-provider
//! settings, loop defaults, credential resolution and placeholder substitution.

#![allow(clippy::must_use_candidate)]

mod env;
pub mod error;
mod loader;
pub mod placeholder;
pub mod provider;
pub mod secret;

use indexmap::IndexMap;
use serde::Deserialize;

pub use error::ConfigError;
pub use placeholder::substitute;
pub use provider::{ProviderConfig, ProviderType};
pub use secret::{EnvSecretResolver, SecretResolver, StaticSecretResolver, require_secret};

/// Default maximum number of tool round-trips per call
pub const DEFAULT_TURNS: u32 = 12;

/// Top-level Relay configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Loop defaults applied to every call unless overridden
    #[serde(default)]
    pub defaults: OperateDefaults,
    /// Provider configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
}

/// Loop defaults shared by all providers
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperateDefaults {
    /// Maximum tool round-trips before a call ends incomplete
    #[serde(default = "default_turns")]
    pub turns: u32,
    /// Retry bound for errors classified as retryable
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Retry bound for errors the classifier could not map
    #[serde(default = "default_retries")]
    pub unknown_max_retries: u32,
    /// Delay between retries when the classifier suggests none
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for OperateDefaults {
    fn default() -> Self {
        Self {
            turns: default_turns(),
            max_retries: default_retries(),
            unknown_max_retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

const fn default_turns() -> u32 {
    DEFAULT_TURNS
}

const fn default_retries() -> u32 {
    2
}

const fn default_retry_delay_ms() -> u64 {
    1_000
}
