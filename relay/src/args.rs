use std::path::PathBuf;

use clap::Parser;

/// Relay LLM runner
#[derive(Debug, Parser)]
#[command(name = "relay", about = "Run a prompt through a configured LLM provider")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml", env = "RELAY_CONFIG")]
    pub config: PathBuf,

    /// Provider name from the config (first configured provider when omitted)
    #[arg(short, long, env = "RELAY_PROVIDER")]
    pub provider: Option<String>,

    /// Override the provider's default model
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Maximum tool round-trips (config default when omitted)
    #[arg(long)]
    pub turns: Option<u32>,

    /// Print chunks as JSON lines while the answer streams
    #[arg(long)]
    pub stream: bool,

    /// Include tool-call and tool-result chunks when streaming
    #[arg(long)]
    pub include_tools: bool,

    /// Emit logs as JSON
    #[arg(long, env = "RELAY_LOG_JSON")]
    pub log_json: bool,

    /// Prompt to send
    pub prompt: String,
}
