//! Streaming tool loop
//!
//! The loop is a pull-based state machine: each poll of the returned stream
//! advances it just far enough to produce the next chunk. Tools run between
//! vendor turns, never while a vendor stream is being read.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::adapter::Adapter;
use crate::error::LlmError;
use crate::turn::{TurnContext, vendor_failure, with_retry};
use crate::types::{
    EventStream, HistoryItem, OperateError, OperateInput, OperateRequest, StopReason, StreamChunk, StreamEvent,
    ToolCall, TurnAccumulator,
};

/// Chunks of one streamed call, followed by its final history
///
/// The history becomes available once the terminal `done` or `error` chunk
/// has been yielded. It is the caller's to seed the next call with.
pub struct ChunkStream {
    chunks: Pin<Box<dyn Stream<Item = StreamChunk> + Send>>,
    history_rx: oneshot::Receiver<Vec<HistoryItem>>,
    history: Option<Vec<HistoryItem>>,
}

impl ChunkStream {
    fn new(
        chunks: impl Stream<Item = StreamChunk> + Send + 'static,
        history_rx: oneshot::Receiver<Vec<HistoryItem>>,
    ) -> Self {
        Self {
            chunks: Box::pin(chunks),
            history_rx,
            history: None,
        }
    }

    /// Updated history, once the terminal chunk has been yielded
    ///
    /// `None` before that, and for calls rejected before the first vendor
    /// request.
    pub fn history(&mut self) -> Option<&[HistoryItem]> {
        if self.history.is_none() {
            self.history = self.history_rx.try_recv().ok();
        }
        self.history.as_deref()
    }

    /// Take the updated history; see [`history`](Self::history)
    pub fn into_history(mut self) -> Option<Vec<HistoryItem>> {
        self.history.take().or_else(|| self.history_rx.try_recv().ok())
    }
}

impl Stream for ChunkStream {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.poll_next_unpin(cx)
    }
}

/// Run the tool loop, yielding chunks as they become available
///
/// The stream ends after a `done` chunk on success or a single `error` chunk
/// on failure, cancellation, or turn-limit exhaustion. Tool-call and
/// tool-result chunks are only produced when `request.include_tools` is set.
pub fn stream<A: Adapter>(
    adapter: A,
    client: Arc<A::Client>,
    default_model: Option<String>,
    input: OperateInput,
    request: OperateRequest,
) -> ChunkStream {
    let (history_tx, history_rx) = oneshot::channel();

    let ctx = match TurnContext::prepare(default_model.as_deref(), input, request) {
        Ok(ctx) => ctx,
        Err(error) => {
            let chunk = StreamChunk::from(OperateError::from(&error));
            return ChunkStream::new(futures_util::stream::iter([chunk]), history_rx);
        }
    };

    let state = StreamState {
        adapter,
        client,
        ctx,
        phase: Phase::Request,
        pending: VecDeque::new(),
        history_tx: Some(history_tx),
    };

    let chunks = futures_util::stream::unfold(state, |mut state| async move {
        let chunk = state.next_chunk().await?;
        Some((chunk, state))
    });
    ChunkStream::new(chunks, history_rx)
}

enum Phase {
    /// Open the next vendor stream
    Request,
    /// Read the current vendor stream
    Streaming {
        events: EventStream,
        turn: TurnAccumulator,
    },
    /// Announce the next pending tool call
    Tools(VecDeque<ToolCall>),
    /// Execute an announced tool call
    RunTool { call: ToolCall, rest: VecDeque<ToolCall> },
    Finished,
}

struct StreamState<A: Adapter> {
    adapter: A,
    client: Arc<A::Client>,
    ctx: TurnContext,
    phase: Phase,
    pending: VecDeque<StreamChunk>,
    history_tx: Option<oneshot::Sender<Vec<HistoryItem>>>,
}

impl<A: Adapter> StreamState<A> {
    async fn next_chunk(&mut self) -> Option<StreamChunk> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Some(chunk);
            }

            let phase = std::mem::replace(&mut self.phase, Phase::Finished);
            if matches!(phase, Phase::Finished) {
                return None;
            }

            self.phase = if self.ctx.is_cancelled() {
                self.cancel()
            } else {
                match phase {
                    Phase::Request => self.open_turn().await,
                    Phase::Streaming { events, turn } => self.read_events(events, turn).await,
                    Phase::Tools(calls) => self.announce_tool(calls),
                    Phase::RunTool { call, rest } => self.run_tool(call, rest).await,
                    Phase::Finished => Phase::Finished,
                }
            };

            if matches!(self.phase, Phase::Finished) {
                self.release_history();
            }
        }
    }

    /// Hand the history to the caller; the receiver may already be gone
    fn release_history(&mut self) {
        if let Some(tx) = self.history_tx.take() {
            let _ = tx.send(std::mem::take(&mut self.ctx.history));
        }
    }

    async fn open_turn(&mut self) -> Phase {
        let provider = self.adapter.provider();
        self.ctx.announce_request(provider);

        let wire = match self.adapter.build_request(&self.ctx.model_request()) {
            Ok(wire) => wire,
            Err(error) => return self.fail(&error),
        };

        let adapter = &self.adapter;
        let client: &A::Client = &self.client;
        let ctx = &self.ctx;
        let opened = with_retry(adapter, ctx, || {
            adapter.execute_stream(client, &wire, ctx.signal.as_ref())
        })
        .await;

        match opened {
            Ok(Some(events)) => Phase::Streaming {
                events,
                turn: TurnAccumulator::default(),
            },
            Ok(None) => self.cancel(),
            Err(error) => self.fail(&error),
        }
    }

    async fn read_events(&mut self, mut events: EventStream, mut turn: TurnAccumulator) -> Phase {
        let signal = self.ctx.signal.clone();

        loop {
            let next = tokio::select! {
                biased;
                () = cancelled(signal.as_ref()) => return self.cancel(),
                next = events.next() => next,
            };

            match next {
                Some(Ok(StreamEvent::Done)) | None => return self.finish_turn(turn),
                Some(Ok(event)) => {
                    if let Some(content) = turn.push(event).filter(|text| !text.is_empty()) {
                        self.pending.push_back(StreamChunk::Text { content });
                        return Phase::Streaming { events, turn };
                    }
                }
                Some(Err(error)) => {
                    let error = vendor_failure(&self.adapter, &self.ctx, error);
                    return self.fail(&error);
                }
            }
        }
    }

    fn finish_turn(&mut self, mut turn: TurnAccumulator) -> Phase {
        let provider = self.adapter.provider();
        let usage = turn.usage(provider, &self.ctx.model);
        let calls = turn.tool_calls();
        self.ctx.hooks.after_each_model_response(&usage, &calls);
        self.ctx.usage.push(usage);

        let structured = self
            .adapter
            .streamed_structured_output(&turn.text, &calls, self.ctx.schema.as_ref());
        if let Some(result) = structured {
            return match result {
                Ok(value) => {
                    let content = value.to_string();
                    self.ctx.history.push(HistoryItem::assistant(content.clone()));
                    // Text answers already streamed; a tool-delivered one has not
                    if !calls.is_empty() {
                        self.pending.push_back(StreamChunk::Text { content });
                    }
                    self.done()
                }
                Err(error) => self.fail(&error),
            };
        }

        if calls.is_empty() {
            if turn.stop_reason == Some(StopReason::ToolCalls) {
                tracing::warn!(provider = %provider, "vendor reported pending work but streamed no tool calls");
            }
            self.ctx.history.push(HistoryItem::assistant(std::mem::take(&mut turn.text)));
            return self.done();
        }

        if self.ctx.turns_used >= self.ctx.turns {
            tracing::warn!(
                provider = %provider,
                turns = self.ctx.turns,
                pending = calls.len(),
                "turn limit reached with tool calls pending"
            );
            self.pending
                .push_back(StreamChunk::from(OperateError::turn_limit(self.ctx.turns)));
            return Phase::Finished;
        }

        Phase::Tools(calls.into())
    }

    fn announce_tool(&mut self, mut calls: VecDeque<ToolCall>) -> Phase {
        let Some(call) = calls.pop_front() else {
            self.ctx.turns_used += 1;
            return Phase::Request;
        };

        if self.ctx.include_tools {
            self.pending.push_back(StreamChunk::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            });
        }
        Phase::RunTool { call, rest: calls }
    }

    async fn run_tool(&mut self, call: ToolCall, rest: VecDeque<ToolCall>) -> Phase {
        match self.ctx.run_tool(&call).await {
            Ok(output) => {
                if self.ctx.include_tools {
                    self.pending.push_back(StreamChunk::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        result: output.clone(),
                    });
                }
                self.ctx.record_tool(&call, output);
                Phase::Tools(rest)
            }
            Err(error) => self.fail(&error),
        }
    }

    fn done(&mut self) -> Phase {
        self.pending.push_back(StreamChunk::Done {
            usage: std::mem::take(&mut self.ctx.usage),
        });
        Phase::Finished
    }

    fn fail(&mut self, error: &LlmError) -> Phase {
        self.pending.push_back(StreamChunk::from(OperateError::from(error)));
        Phase::Finished
    }

    fn cancel(&mut self) -> Phase {
        tracing::info!(provider = self.adapter.provider(), turn = self.ctx.turns_used, "stream cancelled");
        self.pending.push_back(StreamChunk::from(OperateError::cancelled()));
        Phase::Finished
    }
}

async fn cancelled(signal: Option<&CancellationToken>) {
    match signal {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
