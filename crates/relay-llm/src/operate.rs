//! Non-streaming tool loop

use crate::adapter::Adapter;
use crate::error::LlmError;
use crate::turn::{TurnContext, with_retry};
use crate::types::{Content, HistoryItem, OperateError, OperateInput, OperateRequest, OperateResponse};

/// Run the tool loop to completion
///
/// Each turn sends the history to the vendor, runs every requested tool in
/// order and appends both the calls and their outputs to history. The loop
/// ends on a response with no tool calls, a structured answer, cancellation,
/// or once `request.turns` tool round-trips have been spent.
///
/// # Errors
///
/// Returns rate-limit, unrecoverable and exhausted-retry vendor failures,
/// tool failures, and invalid requests. Cancellation and the turn limit are
/// not errors; they produce an `Incomplete` response.
pub async fn operate<A: Adapter>(
    adapter: &A,
    client: &A::Client,
    default_model: Option<&str>,
    input: OperateInput,
    request: OperateRequest,
) -> Result<OperateResponse, LlmError> {
    let mut ctx = TurnContext::prepare(default_model, input, request)?;
    let provider = adapter.provider();

    loop {
        ctx.announce_request(provider);
        let wire = adapter.build_request(&ctx.model_request())?;

        let response = with_retry(adapter, &ctx, || {
            adapter.execute_request(client, &wire, ctx.signal.as_ref())
        })
        .await?;

        let Some(response) = response else {
            tracing::info!(provider = %provider, turn = ctx.turns_used, "operate cancelled");
            return Ok(ctx.incomplete(Content::default(), OperateError::cancelled()));
        };

        let usage = adapter.extract_usage(&response, &ctx.model);
        let calls = adapter.extract_tool_calls(&response);
        ctx.hooks.after_each_model_response(&usage, &calls);
        ctx.usage.push(usage);

        let parsed = adapter.parse_response(&response, ctx.schema.as_ref())?;

        if let Content::Structured(_) = &parsed.content {
            ctx.history.push(HistoryItem::assistant(parsed.content.to_history_text()));
            return Ok(ctx.complete(parsed.content));
        }

        if calls.is_empty() {
            if !adapter.is_complete(&response) {
                tracing::warn!(
                    provider = %provider,
                    stop_reason = ?parsed.stop_reason,
                    "vendor reported pending work but returned no tool calls"
                );
            }
            ctx.history.push(HistoryItem::assistant(parsed.content.to_history_text()));
            return Ok(ctx.complete(parsed.content));
        }

        if ctx.turns_used >= ctx.turns {
            tracing::warn!(
                provider = %provider,
                turns = ctx.turns,
                pending = calls.len(),
                "turn limit reached with tool calls pending"
            );
            let turns = ctx.turns;
            return Ok(ctx.incomplete(parsed.content, OperateError::turn_limit(turns)));
        }

        for call in &calls {
            let output = ctx.run_tool(call).await?;
            ctx.record_tool(call, output);
        }
        ctx.turns_used += 1;
    }
}
