use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::{HistoryError, HistoryResult};
use crate::models::history_store::{CancelFlag, HistoryPage};
use crate::models::message::Message;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Paged access to a session's persisted history.
///
/// Pages are served newest-first with a continuation flag; the core
/// reverses them before merging. Implementations should observe the
/// cancel flag and bail out early once it trips.
pub trait HistorySource: Send + Sync + 'static {
    fn fetch_page(
        &self,
        session_id: &str,
        offset: usize,
        limit: usize,
        cancel: CancelFlag,
    ) -> BoxFuture<'static, HistoryResult<HistoryPage>>;
}

/// Wire shape of the paged-messages endpoint.
#[derive(Debug, Deserialize)]
struct PagePayload {
    messages: Vec<Message>,
    #[serde(default, alias = "hasMore")]
    has_more: bool,
}

/// Fetches history pages from the assistant server's HTTP API.
pub struct HttpHistorySource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistorySource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl HistorySource for HttpHistorySource {
    fn fetch_page(
        &self,
        session_id: &str,
        offset: usize,
        limit: usize,
        cancel: CancelFlag,
    ) -> BoxFuture<'static, HistoryResult<HistoryPage>> {
        let request = self
            .client
            .get(format!(
                "{}/api/chat/sessions/{}/messages",
                self.base_url, session_id
            ))
            .query(&[("offset", offset), ("limit", limit)]);

        Box::pin(async move {
            let response = request.send().await?.error_for_status()?;
            let bytes = response.bytes().await?;
            if cancel.is_cancelled() {
                return Err(HistoryError::Cancelled);
            }
            let payload: PagePayload = serde_json::from_slice(&bytes)?;
            Ok(HistoryPage {
                messages: payload.messages,
                has_more: payload.has_more,
            })
        })
    }
}

/// In-memory source for tests and development. Stores each session's
/// full history oldest-first and serves pages newest-first, the same
/// order the real API uses.
#[derive(Clone, Default)]
pub struct InMemoryHistorySource {
    sessions: Arc<Mutex<HashMap<String, Vec<Message>>>>,
}

impl InMemoryHistorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a session's stored history (oldest to newest).
    pub fn set_history(&self, session_id: impl Into<String>, messages: Vec<Message>) {
        self.sessions.lock().insert(session_id.into(), messages);
    }
}

impl HistorySource for InMemoryHistorySource {
    fn fetch_page(
        &self,
        session_id: &str,
        offset: usize,
        limit: usize,
        cancel: CancelFlag,
    ) -> BoxFuture<'static, HistoryResult<HistoryPage>> {
        let sessions = self.sessions.clone();
        let session_id = session_id.to_string();

        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(HistoryError::Cancelled);
            }
            let store = sessions.lock();
            let all = store.get(&session_id).cloned().unwrap_or_default();
            let page: Vec<Message> = all.iter().rev().skip(offset).take(limit).cloned().collect();
            let has_more = offset + page.len() < all.len();
            Ok(HistoryPage {
                messages: page,
                has_more,
            })
        })
    }
}
