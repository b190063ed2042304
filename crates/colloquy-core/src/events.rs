use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::message::TokenUsage;

/// Typed events on a session's live feed.
///
/// The transport (polling, push stream, socket) is someone else's
/// concern; the only assumption made here is strict per-session
/// emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A new assistant turn began streaming.
    Started,
    /// Incremental response text; always appended, never replacing.
    TextDelta { text: String },
    /// Transient status line shown alongside the growing response.
    StatusText { text: String },
    /// The assistant invoked a tool.
    ToolCallStarted { id: String, name: String, input: Value },
    /// A tool finished; `is_error` marks failed executions.
    ToolCallResult {
        id: String,
        output: String,
        #[serde(default)]
        is_error: bool,
    },
    /// The named tool call needs a human decision before it runs.
    ApprovalRequired { id: String, call_id: String },
    /// Token accounting for the in-flight turn.
    TokenUsage { usage: TokenUsage },
    /// The turn finished; buffered content seals into a message.
    /// `message_id` is the identifier the session store assigned, when
    /// the feed knows it; otherwise one is generated locally.
    Completed {
        #[serde(default)]
        message_id: Option<String>,
    },
    /// The turn was cut short; nothing is persisted.
    Aborted { reason: String },
}
