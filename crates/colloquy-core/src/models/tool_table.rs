use crate::models::diagnostics::Anomaly;
use crate::models::message::{ToolCall, ToolResult};

/// Correlation state for one tool call within the live turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallEntry {
    pub call: ToolCall,
    pub result: Option<ToolResult>,
}

/// Matches tool calls to their eventual results, in arrival order.
///
/// Scoped to exactly one live turn: the owning model drains it into the
/// sealed message on finish and discards it on abort.
#[derive(Debug, Default)]
pub struct ToolCallTable {
    entries: Vec<ToolCallEntry>,
    orphans: Vec<ToolResult>,
}

impl ToolCallTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&mut self, call: ToolCall) {
        self.entries.push(ToolCallEntry { call, result: None });
    }

    /// Attach a result to its call. At most one result is accepted per
    /// call; a second is rejected and the first stands. A result for an
    /// unknown call id is kept as an orphan so its content is still
    /// shown, just unassociated. Both cases return the anomaly for the
    /// caller's diagnostic log.
    pub fn record_result(&mut self, result: ToolResult) -> Option<Anomaly> {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.call.id == result.call_id)
        {
            Some(entry) if entry.result.is_some() => Some(Anomaly::DuplicateToolResult {
                call_id: result.call_id,
            }),
            Some(entry) => {
                entry.result = Some(result);
                None
            }
            None => {
                let call_id = result.call_id.clone();
                self.orphans.push(result);
                Some(Anomaly::OrphanToolResult { call_id })
            }
        }
    }

    /// Calls still awaiting a result.
    pub fn pending_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.result.is_none())
            .map(|entry| entry.call.id.as_str())
            .collect()
    }

    pub fn get(&self, call_id: &str) -> Option<&ToolCallEntry> {
        self.entries.iter().find(|entry| entry.call.id == call_id)
    }

    pub fn entries(&self) -> &[ToolCallEntry] {
        &self.entries
    }

    pub fn orphans(&self) -> &[ToolResult] {
        &self.orphans
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.orphans.is_empty()
    }

    pub(crate) fn drain(self) -> (Vec<ToolCallEntry>, Vec<ToolResult>) {
        (self.entries, self.orphans)
    }
}
