use anyhow::Result;
use pagewatch_common::observability::{LogConfig, LogFormat, init_logging};
use pagewatch_config::{MonitorConfig, MonitorConfigLoader};
use wire::build_monitor;
mod wire;

const CONFIG_ENV: &str = "PAGEWATCH_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "pagewatch.yaml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logging problems never stop a run.
    match init_logging(LogConfig {
        format: LogFormat::from_env(),
        ..LogConfig::default()
    }) {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "logging.ready"),
        Ok(None) => {}
        Err(e) => eprintln!("pagewatch: logging unavailable: {e:#}"),
    }

    // An explicit path must exist; the default file is optional.
    let loader = match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => MonitorConfigLoader::new().with_file(path),
        _ => MonitorConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    let cfg: MonitorConfig = loader.load().inspect_err(|e| {
        tracing::error!(error = %e, "config.load.failed");
    })?;

    let monitor = build_monitor(&cfg)?;
    match monitor.run_once().await {
        Ok(outcome) => {
            tracing::info!(?outcome, "monitor.run.finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "monitor.state.failed");
            Err(e.into())
        }
    }
}
