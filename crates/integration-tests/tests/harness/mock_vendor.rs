//! Mock vendor server for integration tests
//!
//! Serves the `OpenAI` chat completions and Anthropic messages routes from a
//! shared script of canned replies and records every request it receives.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// One canned reply
pub enum Reply {
    /// JSON body with a status
    Json(StatusCode, Value),
    /// Server-sent events, one `data:` payload each
    Sse(Vec<String>),
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self::Json(StatusCode::OK, body)
    }

    pub fn error(status: StatusCode, error_type: &str, message: &str) -> Self {
        Self::Json(
            status,
            json!({"error": {"type": error_type, "message": message}}),
        )
    }

    pub fn sse(events: impl IntoIterator<Item = Value>) -> Self {
        Self::Sse(events.into_iter().map(|event| event.to_string()).collect())
    }
}

/// A request the mock received
#[derive(Debug, Clone)]
pub struct Received {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    script: Mutex<VecDeque<Reply>>,
    received: Mutex<Vec<Received>>,
}

/// In-process vendor that answers from a script
pub struct MockVendor {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockVendor {
    /// Start the server with the replies it will give, in order
    pub async fn start(script: Vec<Reply>) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            script: Mutex::new(script.into()),
            received: Mutex::default(),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle))
            .route("/v1/messages", routing::post(handle))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_signal = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown_signal.cancelled().await })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL including the `/v1` prefix
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().unwrap().clone()
    }
}

impl Drop for MockVendor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.received.lock().unwrap().push(Received {
        path: uri.path().to_owned(),
        headers,
        body,
    });

    let reply = state.script.lock().unwrap().pop_front();
    match reply {
        Some(Reply::Json(status, body)) => (status, axum::Json(body)).into_response(),
        Some(Reply::Sse(events)) => {
            let body: String = events.iter().map(|data| format!("data: {data}\n\n")).collect();
            (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({"error": {"type": "script_exhausted", "message": "no reply scripted"}})),
        )
            .into_response(),
    }
}

/// `OpenAI` completion with plain text
pub fn openai_text(text: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": "mock-model",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    })
}

/// `OpenAI` completion requesting one tool call
pub fn openai_tool_call(id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": "mock-model",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{"id": id, "type": "function", "function": {"name": name, "arguments": arguments}}],
            },
            "finish_reason": "tool_calls",
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 8, "total_tokens": 28},
    })
}

/// `OpenAI` stream chunk carrying a text delta
pub fn openai_delta(text: &str) -> Value {
    json!({"choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]})
}

/// Anthropic message with plain text
pub fn anthropic_text(text: &str) -> Value {
    json!({
        "id": "msg_mock",
        "type": "message",
        "role": "assistant",
        "model": "mock-model",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 9, "output_tokens": 4},
    })
}
