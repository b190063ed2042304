use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{HistoryError, ProtocolError};
use crate::events::StreamEvent;
use crate::models::approvals::{ApprovalRequest, ApprovalState, Decision, SessionApprovals};
use crate::models::diagnostics::{Anomaly, DiagnosticLog};
use crate::models::history_store::HistoryStore;
use crate::models::message::{ContentBlock, Message, Role, ToolCall, ToolResult};
use crate::models::stream_accumulator::{AbortInfo, StreamAccumulator};
use crate::models::timeline::{PageCursor, Timeline};
use crate::models::tool_table::ToolCallTable;
use crate::services::decision::DecisionSink;
use crate::services::history_source::HistorySource;

/// Outcome of a [`ConversationModel::load_older`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and merged; how many messages were new.
    Loaded(usize),
    /// Nothing to do: no more history, or a fetch already in flight.
    Skipped,
}

/// Presentation view of one tool call within the live turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallView {
    pub call: ToolCall,
    pub approval: Option<ApprovalState>,
    pub result: Option<ToolResult>,
}

/// Presentation view of the in-progress assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveView {
    pub text: String,
    pub status: Option<String>,
    pub tool_calls: Vec<ToolCallView>,
    pub pending_approval: Option<ApprovalRequest>,
}

/// Read-only entry of the composed timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineItem {
    /// A persisted, immutable message.
    Message(Message),
    /// The in-progress assistant turn.
    Live(LiveView),
}

/// Mutable core of one conversation session.
///
/// Owns the timeline, the pagination cursor, and all live-turn state;
/// every mutation for the session funnels through its methods. Binding
/// layers read snapshots via [`current_timeline`](Self::current_timeline)
/// and compare [`revision`](Self::revision) to know when to re-read.
///
/// One instance per session: switching sessions means dropping this
/// model (which aborts the live turn and cancels in-flight fetches) and
/// constructing a fresh one.
pub struct ConversationModel {
    session_id: String,
    timeline: Timeline,
    history: HistoryStore,
    live: StreamAccumulator,
    tools: ToolCallTable,
    requests: Vec<ApprovalRequest>,
    session_approvals: SessionApprovals,
    diagnostics: DiagnosticLog,
    source: Arc<dyn HistorySource>,
    decisions: Arc<dyn DecisionSink>,
}

impl ConversationModel {
    pub fn new(
        session_id: impl Into<String>,
        config: SessionConfig,
        source: Arc<dyn HistorySource>,
        decisions: Arc<dyn DecisionSink>,
    ) -> Self {
        let session_id = session_id.into();
        Self {
            history: HistoryStore::new(session_id.clone(), config.page_size),
            timeline: Timeline::new(),
            live: StreamAccumulator::new(),
            tools: ToolCallTable::new(),
            requests: Vec::new(),
            session_approvals: SessionApprovals::new(config.approval_scope),
            diagnostics: DiagnosticLog::new(config.max_diagnostics),
            source,
            decisions,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Monotonically increasing staleness counter; bumped by every
    /// mutation that could change a snapshot.
    pub fn revision(&self) -> u64 {
        self.live.revision()
    }

    pub fn is_streaming(&self) -> bool {
        self.live.is_streaming()
    }

    pub fn cursor(&self) -> PageCursor {
        self.history.cursor()
    }

    pub fn last_abort(&self) -> Option<&AbortInfo> {
        self.live.last_abort()
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Approval requests created during the current (or just-aborted)
    /// turn, in arrival order.
    pub fn approval_requests(&self) -> &[ApprovalRequest] {
        &self.requests
    }

    /// The request currently awaiting a human decision, if any.
    pub fn pending_approval(&self) -> Option<&ApprovalRequest> {
        self.requests.iter().find(|request| request.is_pending())
    }

    /// Single entry point for the session's live feed. Correlation
    /// anomalies are recorded and processing continues; a protocol
    /// violation stops the turn until the feed starts a new one.
    pub fn handle_event(&mut self, event: StreamEvent) -> Result<(), ProtocolError> {
        match event {
            StreamEvent::Started => {
                self.start_turn();
                Ok(())
            }
            StreamEvent::TextDelta { text } => self.live.append_delta(&text),
            StreamEvent::StatusText { text } => self.live.note_status(&text),
            StreamEvent::TokenUsage { usage } => self.live.note_usage(usage),
            StreamEvent::ToolCallStarted { id, name, input } => {
                if !self.live.is_streaming() {
                    return Err(ProtocolError::NoActiveTurn {
                        event: "tool_call_started",
                    });
                }
                debug!(session_id = %self.session_id, call_id = %id, tool = %name, "tool call started");
                self.tools.record_call(ToolCall { id, name, input });
                self.live.bump();
                Ok(())
            }
            StreamEvent::ToolCallResult {
                id,
                output,
                is_error,
            } => {
                if !self.live.is_streaming() {
                    return Err(ProtocolError::NoActiveTurn {
                        event: "tool_call_result",
                    });
                }
                if let Some(anomaly) = self.tools.record_result(ToolResult {
                    call_id: id,
                    output,
                    is_error,
                }) {
                    self.diagnostics.record(anomaly);
                }
                self.live.bump();
                Ok(())
            }
            StreamEvent::ApprovalRequired { id, call_id } => self.approval_required(id, call_id),
            StreamEvent::Completed { message_id } => self.finish_turn(message_id),
            StreamEvent::Aborted { reason } => {
                self.abort_turn(&reason);
                Ok(())
            }
        }
    }

    /// Resolve the named approval request. Returns the terminal state,
    /// or `None` for a stale response (already resolved, or unknown
    /// request), which is recorded as a diagnostic rather than an error.
    pub fn respond(&mut self, request_id: &str, decision: Decision) -> Option<ApprovalState> {
        let Some(idx) = self
            .requests
            .iter()
            .position(|request| request.id() == request_id)
        else {
            warn!(request_id = %request_id, "response for unknown approval request");
            self.diagnostics.record(Anomaly::StaleApprovalResponse {
                request_id: request_id.to_string(),
            });
            return None;
        };

        let Some(state) = self.requests[idx].resolve(decision) else {
            self.diagnostics.record(Anomaly::StaleApprovalResponse {
                request_id: request_id.to_string(),
            });
            return None;
        };

        if state == ApprovalState::ApprovedForSession {
            let call = self
                .tools
                .get(self.requests[idx].call_id())
                .map(|entry| entry.call.clone());
            if let Some(call) = call {
                self.session_approvals.allow(&call);
            }
        }

        debug!(request_id = %request_id, state = ?state, "approval resolved");
        self.decisions.submit(request_id, decision);
        self.live.bump();
        Some(state)
    }

    /// Fetch and merge the next older page of history. Overlapping
    /// calls coalesce, and once no further history exists this is a
    /// no-op. A transport failure leaves the timeline and cursor
    /// unchanged; the caller may retry.
    pub async fn load_older(&mut self) -> Result<LoadOutcome, HistoryError> {
        let Some(fetch) = self.history.begin_fetch() else {
            return Ok(LoadOutcome::Skipped);
        };

        let result = self
            .source
            .fetch_page(
                &fetch.session_id,
                fetch.offset,
                fetch.limit,
                fetch.cancel.clone(),
            )
            .await;

        match result {
            Ok(page) => {
                let inserted = self.history.apply_page(&fetch, page, &mut self.timeline);
                self.live.bump();
                Ok(LoadOutcome::Loaded(inserted))
            }
            Err(err) => {
                warn!(session_id = %self.session_id, error = %err, "older page fetch failed");
                self.history.fetch_failed(&fetch);
                Err(err)
            }
        }
    }

    /// Append a locally created message (the just-sent user prompt).
    /// Duplicate identifiers are ignored.
    pub fn push_message(&mut self, message: Message) -> bool {
        let id = message.id.clone();
        if self.timeline.push(message) {
            self.history.note_appended();
            self.live.bump();
            true
        } else {
            debug!(message_id = %id, "duplicate message ignored");
            false
        }
    }

    /// Compose the read-only snapshot: persisted history oldest to
    /// newest, then the in-progress turn if one is streaming. Two calls
    /// without an intervening mutation yield value-equal snapshots.
    pub fn current_timeline(&self) -> Vec<TimelineItem> {
        let mut items: Vec<TimelineItem> = self
            .timeline
            .messages()
            .iter()
            .cloned()
            .map(TimelineItem::Message)
            .collect();

        if let Some(turn) = self.live.turn() {
            let tool_calls = self
                .tools
                .entries()
                .iter()
                .map(|entry| ToolCallView {
                    call: entry.call.clone(),
                    approval: self
                        .requests
                        .iter()
                        .find(|request| request.call_id() == entry.call.id)
                        .map(|request| request.state()),
                    result: entry.result.clone(),
                })
                .collect();

            items.push(TimelineItem::Live(LiveView {
                text: turn.text().to_string(),
                status: turn.status().map(|s| s.to_string()),
                tool_calls,
                pending_approval: self.pending_approval().cloned(),
            }));
        }

        items
    }

    /// Abort any live turn and cancel in-flight pagination. Used when
    /// the session is switched away or the view is torn down; also runs
    /// on drop.
    pub fn shutdown(&mut self) {
        if self.live.is_streaming() {
            self.abort_turn("session closed");
        }
        self.history.reset();
    }

    fn start_turn(&mut self) {
        if self.live.is_streaming() {
            warn!(session_id = %self.session_id, "turn started while another was streaming; discarding previous turn");
            self.deny_pending("superseded");
            self.diagnostics.record(Anomaly::TurnRestarted);
        }
        self.requests.clear();
        self.tools = ToolCallTable::new();
        self.live.start();
    }

    fn approval_required(&mut self, id: String, call_id: String) -> Result<(), ProtocolError> {
        if !self.live.is_streaming() {
            return Err(ProtocolError::NoActiveTurn {
                event: "approval_required",
            });
        }

        let covered = self
            .tools
            .get(&call_id)
            .map(|entry| self.session_approvals.covers(&entry.call))
            .unwrap_or(false);

        if covered {
            debug!(request_id = %id, call_id = %call_id, "session allowance covers call, auto-approving");
            self.decisions.submit(&id, Decision::ApproveForSession);
            self.requests.push(ApprovalRequest::resolved(
                id,
                call_id,
                ApprovalState::ApprovedForSession,
            ));
        } else {
            debug!(request_id = %id, call_id = %call_id, "approval requested");
            self.requests.push(ApprovalRequest::pending(id, call_id));
        }
        self.live.bump();
        Ok(())
    }

    fn finish_turn(&mut self, message_id: Option<String>) -> Result<(), ProtocolError> {
        let finished = self.live.finish()?;
        let table = std::mem::take(&mut self.tools);
        let requests = std::mem::take(&mut self.requests);
        let (entries, orphans) = table.drain();

        let mut content = Vec::new();
        if !finished.text.is_empty() {
            content.push(ContentBlock::Text {
                text: finished.text,
            });
        }
        for entry in entries {
            let approval = requests
                .iter()
                .find(|request| request.call_id() == entry.call.id)
                .map(|request| request.state());
            content.push(ContentBlock::ToolUse {
                call: entry.call,
                approval,
                result: entry.result,
            });
        }
        // orphan output is still shown, just unassociated with a call
        for orphan in orphans {
            content.push(ContentBlock::Text {
                text: orphan.output,
            });
        }

        let message = Message {
            id: message_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            role: Role::Assistant,
            content,
            created_at: Utc::now().timestamp(),
            usage: finished.usage,
        };

        debug!(session_id = %self.session_id, message_id = %message.id, "turn sealed");
        if self.timeline.push(message) {
            self.history.note_appended();
        }
        Ok(())
    }

    fn abort_turn(&mut self, reason: &str) {
        self.deny_pending("turn aborted");
        self.tools = ToolCallTable::new();
        self.live.abort(reason);
    }

    /// A pending request is never left dangling: anything unresolved
    /// when the turn ends abnormally is denied, and the denial is
    /// reported upstream like an explicit one.
    fn deny_pending(&mut self, why: &str) {
        for idx in 0..self.requests.len() {
            if !self.requests[idx].is_pending() {
                continue;
            }
            if self.requests[idx].resolve(Decision::Deny).is_some() {
                let id = self.requests[idx].id().to_string();
                debug!(request_id = %id, why, "pending approval implicitly denied");
                self.decisions.submit(&id, Decision::Deny);
            }
        }
    }
}

impl Drop for ConversationModel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::decision::ChannelDecisionSink;
    use crate::services::history_source::{BoxFuture, InMemoryHistorySource};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn msg(id: &str, text: &str) -> Message {
        Message {
            id: id.to_string(),
            role: Role::User,
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
            created_at: 0,
            usage: None,
        }
    }

    fn model_with(
        source: Arc<dyn HistorySource>,
        config: SessionConfig,
    ) -> (
        ConversationModel,
        mpsc::UnboundedReceiver<(String, Decision)>,
    ) {
        let (sink, rx) = ChannelDecisionSink::new();
        (ConversationModel::new("s1", config, source, sink), rx)
    }

    fn model() -> (
        ConversationModel,
        mpsc::UnboundedReceiver<(String, Decision)>,
    ) {
        model_with(
            Arc::new(InMemoryHistorySource::new()),
            SessionConfig::default(),
        )
    }

    fn start_tool_call(model: &mut ConversationModel, call_id: &str, request_id: &str) {
        model.handle_event(StreamEvent::Started).unwrap();
        model
            .handle_event(StreamEvent::ToolCallStarted {
                id: call_id.to_string(),
                name: "run_command".to_string(),
                input: json!({"command": "ls"}),
            })
            .unwrap();
        model
            .handle_event(StreamEvent::ApprovalRequired {
                id: request_id.to_string(),
                call_id: call_id.to_string(),
            })
            .unwrap();
    }

    #[test]
    fn test_turn_seals_into_single_message() {
        let (mut model, _rx) = model();

        model.handle_event(StreamEvent::Started).unwrap();
        assert!(model.is_streaming());
        model
            .handle_event(StreamEvent::TextDelta {
                text: "Hello".to_string(),
            })
            .unwrap();
        model
            .handle_event(StreamEvent::TextDelta {
                text: " world".to_string(),
            })
            .unwrap();
        model
            .handle_event(StreamEvent::Completed { message_id: None })
            .unwrap();

        assert!(!model.is_streaming());
        let timeline = model.current_timeline();
        assert_eq!(timeline.len(), 1);
        match &timeline[0] {
            TimelineItem::Message(message) => {
                assert_eq!(message.role, Role::Assistant);
                assert_eq!(message.text(), "Hello world");
            }
            other => panic!("expected a sealed message, got {other:?}"),
        }
    }

    #[test]
    fn test_denied_tool_call_folds_with_error_result() {
        let (mut model, mut rx) = model();

        start_tool_call(&mut model, "t1", "p1");
        let pending = model.pending_approval().unwrap();
        assert_eq!(pending.call_id(), "t1");

        assert_eq!(
            model.respond("p1", Decision::Deny),
            Some(ApprovalState::Denied)
        );
        assert_eq!(rx.try_recv().unwrap(), ("p1".to_string(), Decision::Deny));

        model
            .handle_event(StreamEvent::ToolCallResult {
                id: "t1".to_string(),
                output: "exec command rejected by user".to_string(),
                is_error: true,
            })
            .unwrap();
        model
            .handle_event(StreamEvent::Completed { message_id: None })
            .unwrap();

        let timeline = model.current_timeline();
        let TimelineItem::Message(message) = &timeline[0] else {
            panic!("expected a sealed message");
        };
        let ContentBlock::ToolUse {
            call,
            approval,
            result,
        } = &message.content[0]
        else {
            panic!("expected a folded tool use block");
        };
        assert_eq!(call.id, "t1");
        assert_eq!(*approval, Some(ApprovalState::Denied));
        assert!(result.as_ref().unwrap().is_error);
    }

    #[test]
    fn test_abort_discards_turn_and_denies_pending() {
        let (mut model, mut rx) = model();

        start_tool_call(&mut model, "t1", "p1");
        for text in ["one ", "two ", "three"] {
            model
                .handle_event(StreamEvent::TextDelta {
                    text: text.to_string(),
                })
                .unwrap();
        }

        model
            .handle_event(StreamEvent::Aborted {
                reason: "user interrupted".to_string(),
            })
            .unwrap();

        assert!(!model.is_streaming());
        assert!(model.current_timeline().is_empty());
        assert_eq!(model.last_abort().unwrap().reason, "user interrupted");
        assert_eq!(
            model.approval_requests()[0].state(),
            ApprovalState::Denied
        );
        assert!(model.pending_approval().is_none());
        assert_eq!(rx.try_recv().unwrap(), ("p1".to_string(), Decision::Deny));
    }

    #[tokio::test]
    async fn test_load_older_merges_pages_in_order() {
        let source = InMemoryHistorySource::new();
        source.set_history(
            "s1",
            vec![msg("a", "1"), msg("b", "2"), msg("c", "3"), msg("d", "4")],
        );
        let (mut model, _rx) = model_with(
            Arc::new(source),
            SessionConfig {
                page_size: 2,
                ..SessionConfig::default()
            },
        );

        assert_eq!(model.load_older().await.unwrap(), LoadOutcome::Loaded(2));
        let first: Vec<String> = model
            .current_timeline()
            .iter()
            .map(|item| match item {
                TimelineItem::Message(m) => m.id.clone(),
                TimelineItem::Live(_) => panic!("no live turn expected"),
            })
            .collect();
        assert_eq!(first, vec!["c", "d"]);

        assert_eq!(model.load_older().await.unwrap(), LoadOutcome::Loaded(2));
        let second: Vec<String> = model
            .current_timeline()
            .iter()
            .map(|item| match item {
                TimelineItem::Message(m) => m.id.clone(),
                TimelineItem::Live(_) => panic!("no live turn expected"),
            })
            .collect();
        assert_eq!(second, vec!["a", "b", "c", "d"]);

        // already-displayed entries kept their relative order
        assert!(second.ends_with(&first));

        assert_eq!(model.load_older().await.unwrap(), LoadOutcome::Skipped);
        assert!(!model.cursor().has_more());
    }

    struct FailingSource;

    impl HistorySource for FailingSource {
        fn fetch_page(
            &self,
            _session_id: &str,
            _offset: usize,
            _limit: usize,
            _cancel: crate::models::history_store::CancelFlag,
        ) -> BoxFuture<'static, crate::error::HistoryResult<crate::models::history_store::HistoryPage>>
        {
            Box::pin(async {
                Err(HistoryError::Unavailable {
                    message: "connection refused".to_string(),
                })
            })
        }
    }

    #[tokio::test]
    async fn test_load_failure_leaves_state_unchanged() {
        let (mut model, _rx) = model_with(Arc::new(FailingSource), SessionConfig::default());

        let before = model.cursor();
        assert!(model.load_older().await.is_err());

        assert_eq!(model.cursor(), before);
        assert!(model.cursor().has_more());
        assert!(model.current_timeline().is_empty());
    }

    #[test]
    fn test_session_allowance_auto_approves_matching_call() {
        let (mut model, mut rx) = model();

        start_tool_call(&mut model, "t1", "p1");
        assert_eq!(
            model.respond("p1", Decision::ApproveForSession),
            Some(ApprovalState::ApprovedForSession)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ("p1".to_string(), Decision::ApproveForSession)
        );

        // same tool again, later in the turn: never observable as pending
        model
            .handle_event(StreamEvent::ToolCallStarted {
                id: "t2".to_string(),
                name: "run_command".to_string(),
                input: json!({"command": "pwd"}),
            })
            .unwrap();
        model
            .handle_event(StreamEvent::ApprovalRequired {
                id: "p2".to_string(),
                call_id: "t2".to_string(),
            })
            .unwrap();

        assert!(model.pending_approval().is_none());
        assert_eq!(
            model.approval_requests()[1].state(),
            ApprovalState::ApprovedForSession
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ("p2".to_string(), Decision::ApproveForSession)
        );
    }

    #[test]
    fn test_input_scoped_allowance_still_asks_for_different_input() {
        let (mut model, _rx) = model_with(
            Arc::new(InMemoryHistorySource::new()),
            SessionConfig {
                approval_scope: crate::models::approvals::ApprovalScope::ToolNameAndInput,
                ..SessionConfig::default()
            },
        );

        start_tool_call(&mut model, "t1", "p1");
        model.respond("p1", Decision::ApproveForSession);

        model
            .handle_event(StreamEvent::ToolCallStarted {
                id: "t2".to_string(),
                name: "run_command".to_string(),
                input: json!({"command": "pwd"}),
            })
            .unwrap();
        model
            .handle_event(StreamEvent::ApprovalRequired {
                id: "p2".to_string(),
                call_id: "t2".to_string(),
            })
            .unwrap();

        assert!(model.pending_approval().is_some());
    }

    #[test]
    fn test_stale_response_is_a_diagnostic() {
        let (mut model, _rx) = model();

        start_tool_call(&mut model, "t1", "p1");
        assert!(model.respond("p1", Decision::ApproveOnce).is_some());
        assert!(model.respond("p1", Decision::Deny).is_none());

        assert_eq!(
            model.approval_requests()[0].state(),
            ApprovalState::ApprovedOnce
        );
        assert!(model.diagnostics().iter().any(|entry| matches!(
            entry.anomaly,
            Anomaly::StaleApprovalResponse { .. }
        )));
    }

    #[test]
    fn test_duplicate_result_correlates_once() {
        let (mut model, _rx) = model();

        model.handle_event(StreamEvent::Started).unwrap();
        model
            .handle_event(StreamEvent::ToolCallStarted {
                id: "t1".to_string(),
                name: "run_command".to_string(),
                input: json!({}),
            })
            .unwrap();
        for _ in 0..2 {
            model
                .handle_event(StreamEvent::ToolCallResult {
                    id: "t1".to_string(),
                    output: "ok".to_string(),
                    is_error: false,
                })
                .unwrap();
        }

        let duplicates = model
            .diagnostics()
            .iter()
            .filter(|entry| matches!(entry.anomaly, Anomaly::DuplicateToolResult { .. }))
            .count();
        assert_eq!(duplicates, 1);

        model
            .handle_event(StreamEvent::Completed { message_id: None })
            .unwrap();
        let timeline = model.current_timeline();
        let TimelineItem::Message(message) = &timeline[0] else {
            panic!("expected a sealed message");
        };
        let folded_results = message
            .content
            .iter()
            .filter(|block| {
                matches!(
                    block,
                    ContentBlock::ToolUse {
                        result: Some(_),
                        ..
                    }
                )
            })
            .count();
        assert_eq!(folded_results, 1);
    }

    #[tokio::test]
    async fn test_no_duplicate_ids_across_pagination_and_live() {
        let source = InMemoryHistorySource::new();
        source.set_history("s1", vec![msg("m8", "earlier"), msg("m9", "later")]);
        let (mut model, _rx) = model_with(Arc::new(source), SessionConfig::default());

        model.handle_event(StreamEvent::Started).unwrap();
        model
            .handle_event(StreamEvent::TextDelta {
                text: "later".to_string(),
            })
            .unwrap();
        model
            .handle_event(StreamEvent::Completed {
                message_id: Some("m9".to_string()),
            })
            .unwrap();

        assert_eq!(model.load_older().await.unwrap(), LoadOutcome::Loaded(1));

        let ids: Vec<String> = model
            .current_timeline()
            .iter()
            .map(|item| match item {
                TimelineItem::Message(m) => m.id.clone(),
                TimelineItem::Live(_) => panic!("no live turn expected"),
            })
            .collect();
        assert_eq!(ids, vec!["m8", "m9"]);
    }

    #[test]
    fn test_push_message_filters_duplicates() {
        let (mut model, _rx) = model();

        assert!(model.push_message(msg("u1", "hi")));
        assert!(!model.push_message(msg("u1", "hi")));
        assert_eq!(model.current_timeline().len(), 1);
    }

    #[test]
    fn test_current_timeline_is_value_stable() {
        let (mut model, _rx) = model();

        model.push_message(msg("u1", "hi"));
        model.handle_event(StreamEvent::Started).unwrap();
        model
            .handle_event(StreamEvent::TextDelta {
                text: "thinking".to_string(),
            })
            .unwrap();
        model
            .handle_event(StreamEvent::StatusText {
                text: "Running tests".to_string(),
            })
            .unwrap();

        let revision = model.revision();
        assert_eq!(model.current_timeline(), model.current_timeline());
        assert_eq!(model.revision(), revision);
    }

    #[test]
    fn test_turn_restart_discards_previous_and_denies_pending() {
        let (mut model, mut rx) = model();

        start_tool_call(&mut model, "t1", "p1");
        model.handle_event(StreamEvent::Started).unwrap();

        assert_eq!(rx.try_recv().unwrap(), ("p1".to_string(), Decision::Deny));
        assert!(model
            .diagnostics()
            .iter()
            .any(|entry| entry.anomaly == Anomaly::TurnRestarted));
        assert!(model.is_streaming());
        assert!(model.approval_requests().is_empty());
    }

    #[test]
    fn test_event_without_turn_is_a_protocol_error() {
        let (mut model, _rx) = model();

        let result = model.handle_event(StreamEvent::TextDelta {
            text: "orphaned".to_string(),
        });
        assert_eq!(
            result,
            Err(ProtocolError::NoActiveTurn {
                event: "text_delta"
            })
        );

        // an explicit new start recovers the feed
        model.handle_event(StreamEvent::Started).unwrap();
        model
            .handle_event(StreamEvent::TextDelta {
                text: "ok".to_string(),
            })
            .unwrap();
    }

    #[test]
    fn test_shutdown_aborts_live_turn() {
        let (mut model, _rx) = model();

        model.handle_event(StreamEvent::Started).unwrap();
        model
            .handle_event(StreamEvent::TextDelta {
                text: "partial".to_string(),
            })
            .unwrap();

        model.shutdown();
        assert!(!model.is_streaming());
        assert!(model.current_timeline().is_empty());
    }
}
