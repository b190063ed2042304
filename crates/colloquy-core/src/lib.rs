//! Conversation streaming and permission-handshake core for an
//! interactive AI coding assistant client.
//!
//! The crate is headless. It merges paginated, persisted history with a
//! live response stream, correlates tool calls with their results, and
//! gates tool execution on human approval. Rendering, persistence, the
//! model itself, and tool execution all live elsewhere and talk to this
//! core through the seams in [`services`].

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod services;

pub use config::SessionConfig;
pub use error::{HistoryError, ProtocolError, StatusError};
pub use events::StreamEvent;
pub use models::approvals::{ApprovalRequest, ApprovalScope, ApprovalState, Decision};
pub use models::conversation_model::{
    ConversationModel, LiveView, LoadOutcome, TimelineItem, ToolCallView,
};
pub use models::diagnostics::{Anomaly, DiagnosticEntry, DiagnosticLog};
pub use models::history_store::{CancelFlag, HistoryPage, HistoryStore, PageFetch};
pub use models::message::{ContentBlock, Message, Role, TokenUsage, ToolCall, ToolResult};
pub use models::stream_accumulator::{AbortInfo, StreamAccumulator};
pub use models::timeline::{PageCursor, Timeline};
pub use models::tool_table::{ToolCallEntry, ToolCallTable};
pub use services::decision::{ChannelDecisionSink, DecisionSink};
pub use services::feed::{EventFeed, channel_feed, drive};
pub use services::history_source::{HistorySource, HttpHistorySource, InMemoryHistorySource};
pub use services::status::{
    Connection, HttpStatusProbe, StatusMonitor, StatusProbe, StatusReport,
};
