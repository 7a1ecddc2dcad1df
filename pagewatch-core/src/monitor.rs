//! One monitor run: fetch, extract, compare, then notify and persist.
//!
//! Failures are contained inside the run and logged. The only error handed
//! back to the caller is a state read/write failure, since continuing past it
//! would re-send the same notification on every subsequent run.

use std::sync::Arc;

use pagewatch_common::{NotificationPayload, NotificationSink};
use pagewatch_config::MonitorConfig;
use tracing::{error, info, warn};

use crate::detect::{Action, decide};
use crate::extract::extract;
use crate::page::PageSource;
use crate::state::{StateError, StateStore};

/// Literal strings delimiting the watched region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub start: String,
    /// Empty means "to the end of the page".
    pub end: String,
}

impl Markers {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn from_config(cfg: &MonitorConfig) -> Self {
        Self::new(cfg.start_marker.clone(), cfg.end_marker.clone())
    }
}

/// How a run ended. Logged by the binary; never turned into an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The page could not be fetched; nothing else happened.
    FetchFailed,
    /// Snapshot identical to the stored one.
    Unchanged,
    /// New snapshot stored; `delivered` tells whether the sink accepted the notice.
    Changed { delivered: bool },
    /// Start marker missing; error notice attempted, state untouched.
    StructureChanged { delivered: bool },
}

pub struct Monitor {
    source: Arc<dyn PageSource>,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn NotificationSink>,
    markers: Markers,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn PageSource>,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn NotificationSink>,
        markers: Markers,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            markers,
        }
    }

    /// Execute a single run.
    pub async fn run_once(&self) -> Result<RunOutcome, StateError> {
        let url = self.source.url();
        info!(url = %url, sink = self.sink.name(), "monitor.run.start");

        let raw = match self.source.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                error!(url = %url, error = %e, "monitor.fetch.failed");
                return Ok(RunOutcome::FetchFailed);
            }
        };

        let current = extract(&raw, &self.markers.start, &self.markers.end);
        let previous = match &current {
            Ok(_) => Some(self.store.load()?),
            Err(e) => {
                warn!(error = %e, raw_len = raw.len(), "monitor.extract.failed");
                None
            }
        };

        match decide(previous.as_deref(), &current, url) {
            Action::NoOp => {
                info!("monitor.unchanged");
                Ok(RunOutcome::Unchanged)
            }
            Action::Notify { payload, persist } => {
                info!(
                    previous_len = previous.as_deref().map_or(0, str::len),
                    snapshot_len = persist.len(),
                    snapshot_digest = %digest(&persist),
                    "monitor.changed"
                );
                let delivered = self.dispatch(&payload).await;
                // Persist even when delivery failed; the next run compares against this.
                self.store.save(&persist)?;
                info!(delivered, "monitor.state.saved");
                Ok(RunOutcome::Changed { delivered })
            }
            Action::NotifyError { payload } => {
                error!(
                    start_marker = %self.markers.start,
                    "monitor.listing_section_missing"
                );
                let delivered = self.dispatch(&payload).await;
                Ok(RunOutcome::StructureChanged { delivered })
            }
        }
    }

    async fn dispatch(&self, payload: &NotificationPayload) -> bool {
        match self.sink.notify(payload).await {
            Ok(()) => {
                info!(sink = self.sink.name(), kind = ?payload.kind, "monitor.notify.sent");
                true
            }
            Err(e) => {
                warn!(sink = self.sink.name(), kind = ?payload.kind, error = %e, "monitor.notify.failed");
                false
            }
        }
    }
}

fn digest(snapshot: &str) -> String {
    let hex = blake3::hash(snapshot.as_bytes()).to_hex();
    hex[..16].to_string()
}
