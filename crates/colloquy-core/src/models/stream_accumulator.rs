use chrono::Utc;
use tracing::debug;

use crate::error::ProtocolError;
use crate::models::message::TokenUsage;

/// Why a live turn ended without producing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortInfo {
    pub reason: String,
    /// Unix seconds.
    pub at: i64,
}

/// In-progress state for one assistant turn.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LiveTurn {
    buffer: String,
    status: Option<String>,
    usage: Option<TokenUsage>,
}

impl LiveTurn {
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn usage(&self) -> Option<TokenUsage> {
        self.usage
    }
}

/// The sealed output of a finished turn. The owning model folds tool
/// state into the final message; the accumulator only hands back what
/// it collected itself.
#[derive(Debug, PartialEq)]
pub struct FinishedTurn {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Builds the in-flight assistant message from the ordered event feed.
///
/// The accumulator trusts the transport's per-session ordering and
/// never reorders. Every mutation bumps `revision` so a binding layer
/// can cheaply detect that its snapshot is stale.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    turn: Option<LiveTurn>,
    last_abort: Option<AbortInfo>,
    revision: u64,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_streaming(&self) -> bool {
        self.turn.is_some()
    }

    pub fn turn(&self) -> Option<&LiveTurn> {
        self.turn.as_ref()
    }

    pub fn last_abort(&self) -> Option<&AbortInfo> {
        self.last_abort.as_ref()
    }

    /// The owning model routes its own mutations (pagination merges,
    /// approval transitions) through the same staleness counter.
    pub(crate) fn bump(&mut self) {
        self.revision += 1;
    }

    /// Begin a new turn. Returns true if an unfinished previous turn had
    /// to be discarded first; callers record the anomaly.
    pub fn start(&mut self) -> bool {
        let discarded = self.turn.is_some();
        self.turn = Some(LiveTurn::default());
        self.last_abort = None;
        self.revision += 1;
        discarded
    }

    /// Concatenate onto the in-progress buffer. Never truncates or
    /// replaces prior content.
    pub fn append_delta(&mut self, text: &str) -> Result<(), ProtocolError> {
        let turn = self.turn.as_mut().ok_or(ProtocolError::NoActiveTurn {
            event: "text_delta",
        })?;
        turn.buffer.push_str(text);
        self.revision += 1;
        Ok(())
    }

    /// Replace the transient status line for the in-progress turn.
    pub fn note_status(&mut self, text: &str) -> Result<(), ProtocolError> {
        let turn = self.turn.as_mut().ok_or(ProtocolError::NoActiveTurn {
            event: "status_text",
        })?;
        turn.status = Some(text.to_string());
        self.revision += 1;
        Ok(())
    }

    pub fn note_usage(&mut self, usage: TokenUsage) -> Result<(), ProtocolError> {
        let turn = self.turn.as_mut().ok_or(ProtocolError::NoActiveTurn {
            event: "token_usage",
        })?;
        turn.usage = Some(usage);
        self.revision += 1;
        Ok(())
    }

    /// Seal the buffer and clear the in-progress state. Calling without
    /// an active turn (including a second call after a finish) is a
    /// feed-ordering breach.
    pub fn finish(&mut self) -> Result<FinishedTurn, ProtocolError> {
        let turn = self.turn.take().ok_or(ProtocolError::NoActiveTurn {
            event: "completed",
        })?;
        self.revision += 1;
        Ok(FinishedTurn {
            text: turn.buffer,
            usage: turn.usage,
        })
    }

    /// Discard the in-progress buffer and record the reason. No partial
    /// message survives. Returns false when no turn was active.
    pub fn abort(&mut self, reason: impl Into<String>) -> bool {
        if self.turn.take().is_none() {
            return false;
        }
        let reason = reason.into();
        debug!(reason = %reason, "live turn aborted");
        self.last_abort = Some(AbortInfo {
            reason,
            at: Utc::now().timestamp(),
        });
        self.revision += 1;
        true
    }
}
