pub mod approvals;
pub mod conversation_model;
pub mod diagnostics;
pub mod history_store;
pub mod message;
pub mod stream_accumulator;
pub mod timeline;
pub mod tool_table;

pub use conversation_model::{ConversationModel, LiveView, LoadOutcome, TimelineItem};
pub use message::Message;
