//! Per-call state shared by the operate and stream loops

use std::future::Future;
use std::sync::Arc;

use relay_config::substitute;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::adapter::{Adapter, ModelRequest};
use crate::classify::{ErrorCategory, RetryPolicy};
use crate::error::{LlmError, VendorError};
use crate::format::{OutputFormat, OutputSchema};
use crate::hooks::OperateHooks;
use crate::toolkit::Toolkit;
use crate::types::{
    Content, HistoryItem, OperateError, OperateInput, OperateRequest, OperateResponse, OperateStatus, Role, ToolCall,
    Tools, UsageItem, validate_history,
};

/// Everything one call owns between vendor round-trips
pub(crate) struct TurnContext {
    pub model: String,
    pub history: Vec<HistoryItem>,
    pub system: Option<String>,
    pub instructions: Option<String>,
    pub toolkit: Arc<Toolkit>,
    pub schema: Option<OutputSchema>,
    pub temperature: Option<f64>,
    pub provider_options: Option<Value>,
    pub turns: u32,
    pub turns_used: u32,
    pub usage: Vec<UsageItem>,
    pub hooks: Arc<dyn OperateHooks>,
    pub signal: Option<CancellationToken>,
    pub retry: RetryPolicy,
    pub include_tools: bool,
}

impl TurnContext {
    /// Resolve the model, apply placeholders, seed history, build the toolkit
    /// and normalize the output format
    pub fn prepare(default_model: Option<&str>, input: OperateInput, request: OperateRequest) -> Result<Self, LlmError> {
        let model = request
            .model
            .or_else(|| default_model.map(ToOwned::to_owned))
            .ok_or_else(|| LlmError::InvalidRequest("no model given and the provider has no default".to_owned()))?;

        let data = request.data.as_ref();
        let render = |text: String, enabled: bool| match data {
            Some(data) if enabled => substitute(&text, data),
            _ => text,
        };

        let system = request.system.map(|s| render(s, request.placeholders.system));
        let instructions = request
            .instructions
            .map(|i| render(i, request.placeholders.instructions));

        let mut history = request.history;
        history.extend(input.into_items().into_iter().map(|item| match item {
            HistoryItem::Message {
                role: Role::User,
                content,
            } => HistoryItem::user(render(content, request.placeholders.input)),
            other => other,
        }));
        validate_history(&history)?;

        let toolkit = match request.tools {
            Tools::List(tools) => Arc::new(Toolkit::new(tools)?.with_explain(request.explain)),
            Tools::Toolkit(toolkit) if request.explain => Arc::new((*toolkit).clone().with_explain(true)),
            Tools::Toolkit(toolkit) => toolkit,
        };

        let schema = request.format.as_ref().map(OutputFormat::to_schema).transpose()?;

        Ok(Self {
            model,
            history,
            system,
            instructions,
            toolkit,
            schema,
            temperature: request.temperature,
            provider_options: request.provider_options,
            turns: request.turns,
            turns_used: 0,
            usage: Vec::new(),
            hooks: request.hooks,
            signal: request.signal,
            retry: request.retry,
            include_tools: request.include_tools,
        })
    }

    pub fn model_request(&self) -> ModelRequest<'_> {
        ModelRequest {
            model: &self.model,
            history: &self.history,
            system: self.system.as_deref(),
            instructions: self.instructions.as_deref(),
            toolkit: &self.toolkit,
            schema: self.schema.as_ref(),
            temperature: self.temperature,
            provider_options: self.provider_options.as_ref(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Notify hooks and log before a vendor request
    pub fn announce_request(&self, provider: &str) {
        self.hooks
            .before_each_model_request(provider, &self.model, self.turns_used);
        tracing::debug!(provider = %provider, model = %self.model, turn = self.turns_used, "sending model request");
    }

    /// Run one tool call through the toolkit, firing the tool hooks
    pub async fn run_tool(&self, call: &ToolCall) -> Result<String, LlmError> {
        self.hooks.before_each_tool(call);
        tracing::debug!(tool = %call.name, call_id = %call.id, "running tool");

        match self.toolkit.call(call).await {
            Ok(output) => {
                tracing::debug!(tool = %call.name, call_id = %call.id, "tool finished");
                self.hooks.after_each_tool(call, &output);
                Ok(output)
            }
            Err(error) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %error, "tool failed");
                self.hooks.on_tool_error(call, &error);
                Err(LlmError::Tool {
                    name: call.name.clone(),
                    source: error,
                })
            }
        }
    }

    /// Append a finished call and its output to history
    pub fn record_tool(&mut self, call: &ToolCall, output: String) {
        self.history.push(call.to_history());
        self.history.push(HistoryItem::FunctionCallOutput {
            call_id: call.id.clone(),
            name: call.name.clone(),
            output,
        });
    }

    pub fn complete(self, content: Content) -> OperateResponse {
        OperateResponse {
            content,
            history: self.history,
            status: OperateStatus::Completed,
            usage: self.usage,
            error: None,
        }
    }

    pub fn incomplete(self, content: Content, error: OperateError) -> OperateResponse {
        OperateResponse {
            content,
            history: self.history,
            status: OperateStatus::Incomplete,
            usage: self.usage,
            error: Some(error),
        }
    }
}

/// Turn a vendor error the loop will not retry into the error it reports
pub(crate) fn vendor_failure<A: Adapter>(adapter: &A, ctx: &TurnContext, error: VendorError) -> LlmError {
    let classification = adapter.classify_error(&error);
    let provider = adapter.provider();

    match classification.category {
        ErrorCategory::RateLimit => {
            tracing::error!(provider = %provider, error = %error, "vendor rate limit exceeded");
            LlmError::RateLimited {
                provider: provider.to_owned(),
                retry_after_ms: classification.suggested_delay_ms,
                source: error,
            }
        }
        ErrorCategory::Unrecoverable => {
            tracing::warn!(provider = %provider, error = %error, "unrecoverable vendor error");
            let error = LlmError::Vendor {
                provider: provider.to_owned(),
                classification,
                source: error,
            };
            ctx.hooks.on_unrecoverable_model_error(&error);
            error
        }
        ErrorCategory::Retryable | ErrorCategory::Unknown => {
            tracing::error!(
                provider = %provider,
                category = classification.category.as_str(),
                error = %error,
                "vendor request failed"
            );
            LlmError::Vendor {
                provider: provider.to_owned(),
                classification,
                source: error,
            }
        }
    }
}

/// Run a vendor call under the retry policy
///
/// `Ok(None)` means the call was cancelled, either by the vendor call itself
/// or while waiting to retry.
pub(crate) async fn with_retry<A, T, F, Fut>(adapter: &A, ctx: &TurnContext, mut attempt: F) -> Result<Option<T>, LlmError>
where
    A: Adapter,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>, VendorError>> + Send,
    T: Send,
{
    let mut retries = 0u32;

    loop {
        let error = match attempt().await {
            Ok(result) => return Ok(result),
            Err(error) => error,
        };

        let classification = adapter.classify_error(&error);
        let limit = ctx.retry.limit_for(classification.category).unwrap_or(0);
        if !classification.should_retry || retries >= limit {
            return Err(vendor_failure(adapter, ctx, error));
        }

        retries += 1;
        let delay = ctx.retry.delay_for(&classification);

        if classification.category == ErrorCategory::Unknown {
            tracing::warn!(
                provider = adapter.provider(),
                category = "unknown",
                attempt = retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "retrying unclassified vendor error"
            );
        } else {
            tracing::info!(
                provider = adapter.provider(),
                category = classification.category.as_str(),
                attempt = retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "retrying vendor request"
            );
        }

        match &ctx.signal {
            Some(token) => {
                tokio::select! {
                    () = token.cancelled() => return Ok(None),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }
    }
}
