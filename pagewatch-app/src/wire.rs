use std::sync::Arc;

use anyhow::{Context, Result};
use pagewatch_config::MonitorConfig;
use pagewatch_core::{FileStateStore, HttpPageSource, Markers, Monitor};
use pagewatch_notify::build_sink;

/// Assemble the page source, state store and notifier for one run.
pub fn build_monitor(cfg: &MonitorConfig) -> Result<Monitor> {
    let source = HttpPageSource::from_config(cfg)
        .with_context(|| format!("invalid page url {:?}", cfg.url))?;
    let sink = build_sink(&cfg.notifier).context("notifier setup failed")?;
    let store = FileStateStore::new(&cfg.state_path);

    tracing::info!(
        url = %cfg.url,
        state_path = %store.path().display(),
        notifier = cfg.notifier.kind(),
        retries = cfg.http.retries,
        "monitor.configured"
    );

    Ok(Monitor::new(
        Arc::new(source),
        Arc::new(store),
        sink,
        Markers::from_config(cfg),
    ))
}
