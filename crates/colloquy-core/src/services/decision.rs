use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::approvals::Decision;

/// Outbound boundary for approval decisions.
///
/// The executor's actual tool run and its result come back only through
/// the live event feed, never as a return value here.
pub trait DecisionSink: Send + Sync + 'static {
    fn submit(&self, request_id: &str, decision: Decision);
}

/// Forwards decisions over an unbounded channel to whatever drives the
/// executor.
pub struct ChannelDecisionSink {
    tx: mpsc::UnboundedSender<(String, Decision)>,
}

impl ChannelDecisionSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(String, Decision)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl DecisionSink for ChannelDecisionSink {
    fn submit(&self, request_id: &str, decision: Decision) {
        // ignore error if the receiver side is gone
        if self.tx.send((request_id.to_string(), decision)).is_err() {
            debug!(request_id = %request_id, "decision receiver dropped");
        }
    }
}
