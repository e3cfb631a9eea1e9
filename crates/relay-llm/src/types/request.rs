use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::history::HistoryItem;
use crate::classify::RetryPolicy;
use crate::format::OutputFormat;
use crate::hooks::{NoHooks, OperateHooks};
use crate::toolkit::{Tool, Toolkit};

/// New input for a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperateInput {
    /// Becomes a single user message
    Text(String),
    /// Appended after the seeded history as-is
    Items(Vec<HistoryItem>),
}

impl OperateInput {
    pub(crate) fn into_items(self) -> Vec<HistoryItem> {
        match self {
            Self::Text(text) => vec![HistoryItem::user(text)],
            Self::Items(items) => items,
        }
    }
}

impl From<&str> for OperateInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for OperateInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<HistoryItem>> for OperateInput {
    fn from(items: Vec<HistoryItem>) -> Self {
        Self::Items(items)
    }
}

/// Tools offered to the model
#[derive(Debug, Clone)]
pub enum Tools {
    /// Raw tools, registered into a fresh toolkit per call
    List(Vec<Tool>),
    /// A shared, pre-built toolkit
    Toolkit(Arc<Toolkit>),
}

impl Default for Tools {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// Which fields receive placeholder substitution when `data` is set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholders {
    pub system: bool,
    pub instructions: bool,
    pub input: bool,
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            system: true,
            instructions: true,
            input: true,
        }
    }
}

/// Options for an operate or stream call
#[derive(Clone)]
pub struct OperateRequest {
    /// Model override; the provider's configured model otherwise
    pub model: Option<String>,
    /// Caller-held history from earlier calls
    pub history: Vec<HistoryItem>,
    pub system: Option<String>,
    /// Extra guidance appended to the latest user message
    pub instructions: Option<String>,
    pub tools: Tools,
    /// Narrate tool calls through an `__Explanation` argument
    pub explain: bool,
    /// Structured-output format
    pub format: Option<OutputFormat>,
    pub temperature: Option<f64>,
    /// Maximum tool round-trips
    pub turns: u32,
    /// Opaque vendor-specific fields merged into the request body
    pub provider_options: Option<Value>,
    pub hooks: Arc<dyn OperateHooks>,
    /// Values for `{{ placeholder }}` substitution
    pub data: Option<Value>,
    pub placeholders: Placeholders,
    pub signal: Option<CancellationToken>,
    pub retry: RetryPolicy,
    /// Emit tool-call and tool-result chunks when streaming
    pub include_tools: bool,
}

impl Default for OperateRequest {
    fn default() -> Self {
        Self {
            model: None,
            history: Vec::new(),
            system: None,
            instructions: None,
            tools: Tools::default(),
            explain: false,
            format: None,
            temperature: None,
            turns: relay_config::DEFAULT_TURNS,
            provider_options: None,
            hooks: Arc::new(NoHooks),
            data: None,
            placeholders: Placeholders::default(),
            signal: None,
            retry: RetryPolicy::default(),
            include_tools: false,
        }
    }
}

impl fmt::Debug for OperateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperateRequest")
            .field("model", &self.model)
            .field("history", &self.history.len())
            .field("system", &self.system.is_some())
            .field("format", &self.format.is_some())
            .field("turns", &self.turns)
            .field("include_tools", &self.include_tools)
            .finish_non_exhaustive()
    }
}

impl OperateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryItem>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Tools::List(tools);
        self
    }

    #[must_use]
    pub fn with_toolkit(mut self, toolkit: Arc<Toolkit>) -> Self {
        self.tools = Tools::Toolkit(toolkit);
        self
    }

    #[must_use]
    pub const fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub const fn with_turns(mut self, turns: u32) -> Self {
        self.turns = turns;
        self
    }

    #[must_use]
    pub fn with_provider_options(mut self, options: Value) -> Self {
        self.provider_options = Some(options);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn OperateHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub const fn with_placeholders(mut self, placeholders: Placeholders) -> Self {
        self.placeholders = placeholders;
        self
    }

    #[must_use]
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_include_tools(mut self, include_tools: bool) -> Self {
        self.include_tools = include_tools;
        self
    }
}
