//! Lifecycle hooks
//!
//! Hooks observe the loops; they cannot alter or swallow the errors they are
//! shown. Every method has a no-op default, and the loops call each checkpoint
//! unconditionally.

use crate::error::{LlmError, ToolError};
use crate::types::{ToolCall, UsageItem};

/// Observer for operate and stream calls
pub trait OperateHooks: Send + Sync {
    /// Before each vendor request; `turn` counts completed tool round-trips
    fn before_each_model_request(&self, _provider: &str, _model: &str, _turn: u32) {}

    /// After each successful vendor response
    fn after_each_model_response(&self, _usage: &UsageItem, _tool_calls: &[ToolCall]) {}

    fn before_each_tool(&self, _call: &ToolCall) {}

    fn after_each_tool(&self, _call: &ToolCall, _output: &str) {}

    /// A tool failed; the error propagates after this returns
    fn on_tool_error(&self, _call: &ToolCall, _error: &ToolError) {}

    /// A vendor error will not be retried; it propagates after this returns
    fn on_unrecoverable_model_error(&self, _error: &LlmError) {}
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl OperateHooks for NoHooks {}
