//! Change detection: decide what a run should do with a fresh extraction.

use pagewatch_common::NotificationPayload;

use crate::extract::ExtractionError;

/// What the monitor must do after comparing a snapshot with the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing changed; no notification, no state write.
    NoOp,
    /// Content changed (or was seen for the first time): send `payload`,
    /// then store `persist` whatever the delivery outcome.
    Notify {
        payload: NotificationPayload,
        persist: String,
    },
    /// The listing section is missing: send `payload`, leave state alone.
    NotifyError { payload: NotificationPayload },
}

/// Compare `current` against `previous` (absent reads as `""`).
///
/// ```
/// use pagewatch_core::detect::{decide, Action};
///
/// let current = Ok("Apt A\nApt B\nApt C".to_string());
/// match decide(Some("Apt A\nApt B"), &current, "https://example.org") {
///     Action::Notify { payload, persist } => {
///         assert!(payload.body.contains("Apt C"));
///         assert_eq!(persist, "Apt A\nApt B\nApt C");
///     }
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub fn decide(
    previous: Option<&str>,
    current: &Result<String, ExtractionError>,
    url: &str,
) -> Action {
    match current {
        Err(_) => Action::NotifyError {
            payload: NotificationPayload::structure_error(),
        },
        Ok(snapshot) if snapshot == previous.unwrap_or("") => Action::NoOp,
        Ok(snapshot) => Action::Notify {
            payload: NotificationPayload::change(snapshot, url),
            persist: snapshot.clone(),
        },
    }
}
