//! Provider construction against a mock vendor

use relay_config::{Config, StaticSecretResolver};
use relay_llm::Provider;

/// Secrets every test provider resolves
pub fn secrets() -> StaticSecretResolver {
    StaticSecretResolver::new()
        .with_secret("OPENAI_API_KEY", "sk-test")
        .with_secret("ANTHROPIC_API_KEY", "sk-ant-test")
}

/// Parse a one-provider config pointed at `base_url`
pub fn config(kind: &str, base_url: &str) -> Config {
    let raw = format!(
        r#"
        [defaults]
        retry_delay_ms = 10

        [providers.mock]
        type = "{kind}"
        model = "mock-model"
        base_url = "{base_url}"
        "#
    );
    Config::from_toml_str(&raw).expect("valid test config")
}

/// Build the `mock` provider from a config
pub async fn provider(config: &Config) -> Provider {
    Provider::from_config("mock", &config.providers["mock"], &secrets())
        .await
        .expect("provider builds")
}
