//! Provider-neutral LLM orchestration for Relay
//!
//! One request model drives four vendors (`OpenAI`, Anthropic, Google, AWS
//! Bedrock) through the [`Adapter`](adapter::Adapter) contract. On top of it
//! sit a turn-bounded tool loop ([`operate`](operate::operate)) and its
//! streaming counterpart ([`stream`](stream::stream)), sharing one tool
//! registry, one error classifier and one retry policy.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod adapter;
pub mod classify;
pub mod client;
pub mod convert;
pub mod error;
pub mod format;
pub mod hooks;
pub mod operate;
pub mod protocol;
pub mod provider;
pub mod stream;
pub mod toolkit;
mod turn;
pub mod types;

#[cfg(test)]
mod testing;

pub use classify::{ErrorCategory, ErrorClassification, RetryPolicy};
pub use error::{LlmError, ToolError, VendorError};
pub use format::OutputFormat;
pub use hooks::{NoHooks, OperateHooks};
pub use provider::Provider;
pub use stream::ChunkStream;
pub use toolkit::{Tool, Toolkit};
pub use types::{
    Content, HistoryItem, OperateError, OperateInput, OperateRequest, OperateResponse, OperateStatus, Role,
    StreamChunk, ToolCall, UsageItem,
};
