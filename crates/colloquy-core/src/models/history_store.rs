use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::message::Message;
use crate::models::timeline::{PageCursor, Timeline};

/// Cancellation handle for an outstanding fetch.
///
/// Cloned into the transport; tripped when the owning session resets so
/// a late completion can be abandoned mid-flight.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One page of history as it comes off the wire: newest first, plus the
/// continuation flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub has_more: bool,
}

/// Parameters of an in-flight page fetch.
#[derive(Debug, Clone)]
pub struct PageFetch {
    pub session_id: String,
    pub offset: usize,
    pub limit: usize,
    pub cancel: CancelFlag,
    epoch: u64,
}

/// Pagination driver for one session's persisted history.
///
/// `begin_fetch` / `apply_page` / `fetch_failed` form an explicit
/// suspend/resume cycle: the caller performs the transport await in
/// between. Overlapping triggers coalesce into the one outstanding
/// fetch, and `reset` bumps the epoch so a stale completion from before
/// a session switch cannot mutate anything.
#[derive(Debug)]
pub struct HistoryStore {
    session_id: String,
    page_size: usize,
    cursor: PageCursor,
    in_flight: Option<CancelFlag>,
    epoch: u64,
}

impl HistoryStore {
    pub fn new(session_id: impl Into<String>, page_size: usize) -> Self {
        Self {
            session_id: session_id.into(),
            page_size,
            cursor: PageCursor::new(),
            in_flight: None,
            epoch: 0,
        }
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a page fetch, or return `None` when there is nothing to do:
    /// no further history exists, or a fetch is already outstanding.
    pub fn begin_fetch(&mut self) -> Option<PageFetch> {
        if !self.cursor.has_more() {
            return None;
        }
        if self.in_flight.is_some() {
            debug!(session_id = %self.session_id, "page fetch already outstanding, coalescing");
            return None;
        }

        let cancel = CancelFlag::new();
        self.in_flight = Some(cancel.clone());
        Some(PageFetch {
            session_id: self.session_id.clone(),
            offset: self.cursor.loaded_count(),
            limit: self.page_size,
            cancel,
            epoch: self.epoch,
        })
    }

    /// Fold a completed page into the timeline.
    ///
    /// Wire order is newest-first; it is reversed to chronological before
    /// the identifier-filtered prepend. The cursor advances by the number
    /// of messages actually inserted, not the number fetched. Returns the
    /// inserted count; a stale fetch (issued before a `reset`) mutates
    /// nothing and returns 0.
    pub fn apply_page(
        &mut self,
        fetch: &PageFetch,
        page: HistoryPage,
        timeline: &mut Timeline,
    ) -> usize {
        if fetch.epoch != self.epoch {
            debug!(session_id = %fetch.session_id, "dropping stale page completion");
            return 0;
        }
        self.in_flight = None;

        let mut older = page.messages;
        older.reverse();
        let inserted = timeline.prepend_older(older);
        self.cursor.advance(inserted, page.has_more);

        debug!(
            session_id = %self.session_id,
            inserted,
            loaded = self.cursor.loaded_count(),
            has_more = self.cursor.has_more(),
            "older page applied"
        );
        inserted
    }

    /// A transport or decode failure leaves the cursor and timeline
    /// untouched; the caller may retry with a fresh `begin_fetch`.
    pub fn fetch_failed(&mut self, fetch: &PageFetch) {
        if fetch.epoch == self.epoch {
            self.in_flight = None;
        }
    }

    /// Messages appended at the new end (a sent prompt, a sealed turn)
    /// still count as materialized, keeping later fetch offsets aligned
    /// with the server's newest-first ordering.
    pub(crate) fn note_appended(&mut self) {
        self.cursor.note_appended();
    }

    /// Abandon any outstanding fetch (session switch or teardown).
    pub fn reset(&mut self) {
        if let Some(cancel) = self.in_flight.take() {
            cancel.cancel();
        }
        self.epoch += 1;
    }
}
