//! Change detection for a single watched web page.
//!
//! - [`extract`]: slice the page text between two markers and normalize it
//! - [`detect`]: compare with the stored snapshot and pick an [`detect::Action`]
//! - [`state`]: the one-entry snapshot store
//! - [`page`]: fetch the page and flatten its HTML
//! - [`monitor`]: wire the above into one run
//!
//! # Examples
//! ```no_run
//! use std::sync::Arc;
//! use pagewatch_config::MonitorConfigLoader;
//! use pagewatch_core::{FileStateStore, HttpPageSource, Markers, Monitor};
//!
//! # async fn demo(sink: Arc<dyn pagewatch_common::NotificationSink>) -> anyhow::Result<()> {
//! let cfg = MonitorConfigLoader::new().load()?;
//! let monitor = Monitor::new(
//!     Arc::new(HttpPageSource::from_config(&cfg)?),
//!     Arc::new(FileStateStore::new(&cfg.state_path)),
//!     sink,
//!     Markers::from_config(&cfg),
//! );
//! let outcome = monitor.run_once().await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
pub mod detect;
pub mod extract;
pub mod monitor;
pub mod page;
pub mod state;

pub use detect::{Action, decide};
pub use extract::{ExtractionError, extract, normalize};
pub use monitor::{Markers, Monitor, RunOutcome};
pub use page::{FetchError, HttpPageSource, PageSource, html_to_text};
pub use state::{FileStateStore, MemoryStateStore, StateError, StateStore};
