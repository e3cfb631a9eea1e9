mod args;
mod logging;

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use args::Args;
use clap::Parser;
use futures_util::StreamExt;
use relay_config::{Config, EnvSecretResolver};
use relay_llm::{Content, OperateRequest, OperateStatus, Provider, RetryPolicy, StreamChunk};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    logging::init(args.log_json);

    let config = Config::load(&args.config)?;
    let (name, provider_config) = match &args.provider {
        Some(name) => config
            .providers
            .get_key_value(name)
            .with_context(|| format!("provider `{name}` is not configured"))?,
        None => config.providers.first().context("no providers configured")?,
    };

    tracing::info!(config_path = %args.config.display(), provider = %name, "starting relay");
    let provider = Provider::from_config(name, provider_config, &EnvSecretResolver).await?;

    let signal = CancellationToken::new();
    let cancel = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            cancel.cancel();
        }
    });

    let mut request = OperateRequest::new()
        .with_turns(args.turns.unwrap_or(config.defaults.turns))
        .with_retry(RetryPolicy::from(&config.defaults))
        .with_include_tools(args.include_tools)
        .with_signal(signal);
    if let Some(model) = args.model {
        request = request.with_model(model);
    }
    if let Some(system) = args.system {
        request = request.with_system(system);
    }

    if args.stream {
        stream(&provider, args.prompt, request).await
    } else {
        operate(&provider, args.prompt, request).await
    }
}

async fn operate(provider: &Provider, prompt: String, request: OperateRequest) -> anyhow::Result<ExitCode> {
    let response = provider.operate(prompt, request).await?;

    match &response.content {
        Content::Text(text) => println!("{text}"),
        Content::Structured(value) => println!("{}", serde_json::to_string_pretty(value)?),
    }

    let total: u64 = response.usage.iter().map(|usage| usage.total_tokens).sum();
    tracing::info!(rounds = response.usage.len(), total_tokens = total, "operate finished");

    if response.status == OperateStatus::Incomplete {
        if let Some(error) = &response.error {
            tracing::error!(status = error.status, detail = %error.detail, "operate incomplete");
        }
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn stream(provider: &Provider, prompt: String, request: OperateRequest) -> anyhow::Result<ExitCode> {
    let mut chunks = provider.stream(prompt, request);
    let mut failed = false;

    while let Some(chunk) = chunks.next().await {
        failed |= matches!(chunk, StreamChunk::Error { .. });
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer(&mut stdout, &chunk)?;
        writeln!(stdout)?;
        stdout.flush()?;
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
