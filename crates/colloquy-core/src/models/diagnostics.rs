use std::collections::VecDeque;

use chrono::Utc;
use tracing::warn;

/// A correlation anomaly: logged and surfaced, never fatal. The
/// conversation keeps rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// A result arrived for a call id this turn never recorded.
    OrphanToolResult { call_id: String },
    /// A second result arrived for an already-correlated call.
    DuplicateToolResult { call_id: String },
    /// A response arrived for an approval request that was already
    /// resolved (or never existed).
    StaleApprovalResponse { request_id: String },
    /// A turn started while another was still streaming; the unfinished
    /// one was discarded.
    TurnRestarted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry {
    /// Unix seconds.
    pub at: i64,
    pub anomaly: Anomaly,
}

/// Capacity-bounded anomaly log. Oldest entries are evicted first.
#[derive(Debug)]
pub struct DiagnosticLog {
    entries: VecDeque<DiagnosticEntry>,
    capacity: usize,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn record(&mut self, anomaly: Anomaly) {
        warn!(?anomaly, "correlation anomaly");
        self.entries.push_back(DiagnosticEntry {
            at: Utc::now().timestamp(),
            anomaly,
        });

        // FIFO eviction when exceeding capacity
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
