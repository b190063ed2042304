use std::time::Duration;

use crate::models::approvals::ApprovalScope;

/// Tunables for one conversation session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Messages fetched per older-history page.
    pub page_size: usize,
    /// Interval between connection status probes.
    pub status_interval: Duration,
    /// Capacity of the anomaly log; oldest entries are evicted first.
    pub max_diagnostics: usize,
    /// How a session-wide allowance matches later tool calls.
    pub approval_scope: ApprovalScope,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            status_interval: Duration::from_secs(30),
            max_diagnostics: 256,
            approval_scope: ApprovalScope::ToolName,
        }
    }
}
