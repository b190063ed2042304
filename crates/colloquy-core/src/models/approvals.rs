use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::message::ToolCall;

/// Decision submitted for a pending approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    ApproveOnce,
    ApproveForSession,
    Deny,
}

/// Lifecycle of one approval request. `Pending` resolves exactly once;
/// the terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    ApprovedOnce,
    ApprovedForSession,
    Denied,
}

impl ApprovalState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalState::Pending)
    }
}

impl From<Decision> for ApprovalState {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::ApproveOnce => ApprovalState::ApprovedOnce,
            Decision::ApproveForSession => ApprovalState::ApprovedForSession,
            Decision::Deny => ApprovalState::Denied,
        }
    }
}

/// A human-gated tool call. The surrounding text may keep streaming,
/// but the gated tool is not considered executed until this resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    id: String,
    call_id: String,
    state: ApprovalState,
}

impl ApprovalRequest {
    pub fn pending(id: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_id: call_id.into(),
            state: ApprovalState::Pending,
        }
    }

    /// A request born already resolved (session allowance coverage).
    pub(crate) fn resolved(
        id: impl Into<String>,
        call_id: impl Into<String>,
        state: ApprovalState,
    ) -> Self {
        Self {
            id: id.into(),
            call_id: call_id.into(),
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn state(&self) -> ApprovalState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == ApprovalState::Pending
    }

    /// Resolve once. Returns the new terminal state, or `None` when the
    /// request was already resolved (a stale response the caller
    /// records as a diagnostic).
    pub(crate) fn resolve(&mut self, decision: Decision) -> Option<ApprovalState> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = decision.into();
        Some(self.state)
    }
}

/// What a session-wide allowance matches on. The upstream semantics
/// are under-specified, so the scope is data rather than a hard-coded
/// rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalScope {
    /// Any later call to the same tool is covered.
    #[default]
    ToolName,
    /// Only calls with the same tool name and identical input payload.
    ToolNameAndInput,
}

/// Session-wide allowances, consulted by the conversation model before
/// a new request ever goes pending.
#[derive(Debug)]
pub struct SessionApprovals {
    scope: ApprovalScope,
    allowed: HashSet<String>,
}

impl SessionApprovals {
    pub fn new(scope: ApprovalScope) -> Self {
        Self {
            scope,
            allowed: HashSet::new(),
        }
    }

    fn key(&self, call: &ToolCall) -> String {
        match self.scope {
            ApprovalScope::ToolName => call.name.clone(),
            ApprovalScope::ToolNameAndInput => format!("{}\u{1f}{}", call.name, call.input),
        }
    }

    pub fn allow(&mut self, call: &ToolCall) {
        self.allowed.insert(self.key(call));
    }

    pub fn covers(&self, call: &ToolCall) -> bool {
        self.allowed.contains(&self.key(call))
    }
}
