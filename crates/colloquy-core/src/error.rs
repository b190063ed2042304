use thiserror::Error;

/// Feed-ordering contract breaches.
///
/// These indicate the transport violated its per-session ordering
/// guarantee (or the caller lost track of turn boundaries). Processing
/// of the turn stops; a new `Started` event is required before further
/// events are accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("no active turn for {event} event")]
    NoActiveTurn { event: &'static str },
}

/// Failures while fetching a page of persisted history.
///
/// All variants are recoverable: the cursor and timeline are left
/// unchanged and the caller may retry.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("fetch cancelled")]
    Cancelled,

    #[error("history source unavailable: {message}")]
    Unavailable { message: String },
}

pub type HistoryResult<T> = Result<T, HistoryError>;

/// Failures while probing connection status. The monitor maps these to
/// a `Disconnected` display state rather than surfacing them.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("probe request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed status payload: {0}")]
    Decode(#[from] serde_json::Error),
}
