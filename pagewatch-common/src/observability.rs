//! Logging setup for the `pagewatch` binary and integration tests.
//!
//! Every run appends to a daily-rolling file under the log directory and, by
//! default, mirrors events to stderr so cron mail or the journal picks them
//! up. [`init_logging`] is idempotent: later calls return the path resolved
//! by the first one.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::Local;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_DIR_ENV: &str = "PAGEWATCH_LOG_DIR";
const LOG_FORMAT_ENV: &str = "PAGEWATCH_LOG_FORMAT";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Output encoding for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Read `PAGEWATCH_LOG_FORMAT`; anything other than `json` means text.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Used for the default directory and the file name prefix.
    pub app_name: &'static str,
    /// Explicit directory. Otherwise `PAGEWATCH_LOG_DIR`, then the platform
    /// data dir (`~/.local/share/<app_name>` on Linux).
    pub log_dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: &'static str,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "pagewatch",
            log_dir: None,
            emit_stderr: true,
            format: LogFormat::Text,
            default_filter: "info",
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// Returns today's log file, or `None` when the file sink could not be opened.
/// In that case events go to stderr only and the failure is logged as
/// `logging.file_sink.unavailable`; the caller keeps running. An error is
/// returned only when a global subscriber is already installed elsewhere.
pub fn init_logging(config: LogConfig) -> anyhow::Result<Option<PathBuf>> {
    if let Some(resolved) = LOG_PATH.get() {
        return Ok(resolved.clone());
    }

    let dir = resolve_log_dir(config.app_name, config.log_dir.as_deref());
    let prefix = format!("{}.log", config.app_name);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let file_error = match open_file_writer(&dir, &prefix) {
        Ok((writer, guard)) => {
            let _ = LOG_GUARD.set(guard);
            layers.push(file_layer(config.format, writer));
            None
        }
        Err(e) => Some(e),
    };
    if config.emit_stderr || file_error.is_some() {
        layers.push(stderr_layer(config.format));
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_filter));

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let current_file = match file_error {
        None => {
            let today = Local::now().format("%Y-%m-%d");
            Some(dir.join(format!("{prefix}.{today}")))
        }
        Some(e) => {
            tracing::warn!(dir = %dir.display(), error = %format!("{e:#}"), "logging.file_sink.unavailable");
            None
        }
    };
    let _ = LOG_PATH.set(current_file.clone());
    Ok(current_file)
}

fn open_file_writer(dir: &Path, prefix: &str) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .build(dir)
        .with_context(|| format!("failed to open log file in {}", dir.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}

fn file_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    }
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    }
}

fn resolve_log_dir(app_name: &str, explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return expand_home(dir);
    }
    match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => expand_home(Path::new(&dir)),
        _ => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(app_name),
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(raw) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let dir = resolve_log_dir("pw", Some(Path::new("/tmp/pw-logs")));
        assert_eq!(dir, PathBuf::from("/tmp/pw-logs"));
    }

    #[test]
    fn tilde_is_expanded_and_relative_paths_are_left_alone() {
        assert_eq!(expand_home(Path::new("logs/x")), PathBuf::from("logs/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/logs")), home.join("logs"));
        }
    }

    #[test]
    fn only_json_selects_json() {
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Text);
        assert_eq!(LogFormat::parse(None), LogFormat::Text);
    }

    #[test]
    fn unusable_dir_fails_to_open_a_writer() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let err = open_file_writer(&blocker.join("sub"), "pw.log").unwrap_err();
        assert!(format!("{err:#}").contains("failed to create log directory"));
    }

    #[test]
    fn init_writes_into_requested_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let path = init_logging(LogConfig {
            app_name: "pagewatch-test",
            log_dir: Some(tmp.path().to_path_buf()),
            emit_stderr: false,
            ..LogConfig::default()
        })
        .unwrap()
        .expect("file sink opened");
        // A second call hands back the first resolution.
        let again = init_logging(LogConfig::default()).unwrap();
        assert_eq!(again.as_ref(), Some(&path));
        assert!(path.starts_with(tmp.path()));
    }
}
