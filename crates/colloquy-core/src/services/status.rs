use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::StatusError;
use crate::services::history_source::BoxFuture;

/// What the status endpoint reports when it answers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub connected: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
}

/// Displayed connection state. Probe failures degrade to
/// `Disconnected`; they never propagate as errors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Connection {
    /// No probe has completed yet.
    #[default]
    Unknown,
    Connected {
        version: Option<String>,
        provider: Option<String>,
    },
    Disconnected,
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        matches!(self, Connection::Connected { .. })
    }
}

/// One connection-health check against the assistant server.
pub trait StatusProbe: Send + Sync + 'static {
    fn check(&self) -> BoxFuture<'static, Result<StatusReport, StatusError>>;
}

/// Probes the server's status endpoint over HTTP.
pub struct HttpStatusProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusProbe {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/api/claude-status", base_url.trim_end_matches('/')),
        }
    }
}

impl StatusProbe for HttpStatusProbe {
    fn check(&self) -> BoxFuture<'static, Result<StatusReport, StatusError>> {
        let request = self.client.get(self.url.clone());
        Box::pin(async move {
            let response = request.send().await?.error_for_status()?;
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        })
    }
}

/// Polls a probe at a fixed interval and keeps the latest state for
/// display.
pub struct StatusMonitor {
    probe: Arc<dyn StatusProbe>,
    state: Arc<Mutex<Connection>>,
    interval: Duration,
}

impl StatusMonitor {
    pub fn new(probe: Arc<dyn StatusProbe>, interval: Duration) -> Self {
        Self {
            probe,
            state: Arc::new(Mutex::new(Connection::Unknown)),
            interval,
        }
    }

    /// Latest observed state.
    pub fn connection(&self) -> Connection {
        self.state.lock().clone()
    }

    /// Run one probe cycle and record the outcome.
    pub async fn poll_once(&self) -> Connection {
        let next = match self.probe.check().await {
            Ok(report) if report.connected => Connection::Connected {
                version: report.version,
                provider: report.provider_name,
            },
            Ok(_) => Connection::Disconnected,
            Err(err) => {
                warn!(error = %err, "status probe failed");
                Connection::Disconnected
            }
        };
        debug!(state = ?next, "status probe completed");
        *self.state.lock() = next.clone();
        next
    }

    /// Poll forever at the configured interval. Spawn this on the
    /// runtime; dropping the task stops the polling.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }
}
