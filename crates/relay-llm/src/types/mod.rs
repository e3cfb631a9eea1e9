//! Provider-neutral value types

mod history;
mod request;
mod response;
mod stream;

pub use history::{HistoryItem, Role, validate_history};
pub use request::{OperateInput, OperateRequest, Placeholders, Tools};
pub use response::{
    Content, OperateError, OperateResponse, OperateStatus, ParsedResponse, StopReason, ToolCall, UsageItem,
    synthesize_call_id,
};
pub(crate) use stream::TurnAccumulator;
pub use stream::{EventStream, StreamChunk, StreamEvent};
