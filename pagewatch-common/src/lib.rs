//! Common types and utilities shared across pagewatch crates.
//!
//! This crate defines the notification contract and observability helpers
//! used throughout the pagewatch workspace. It is intentionally lightweight
//! so that the core, the transports and the binary can all depend on it
//! without pulling in HTTP or SMTP stacks.
//!
//! # Overview
//!
//! - [`NotificationPayload`]: subject/body pair handed to a sink
//! - [`NotificationSink`]: the single capability the monitor needs to deliver it
//! - [`NotifyError`]: why a delivery did not happen
//! - [`observability`]: Centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use pagewatch_common::{NotificationKind, NotificationPayload};
//!
//! let payload = NotificationPayload::change("Apt A\nApt B", "https://example.org/listings");
//! assert_eq!(payload.kind, NotificationKind::Change);
//! assert!(payload.body.contains("Apt B"));
//! assert!(payload.body.ends_with("https://example.org/listings"));
//! ```
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod observability;

/// Subject line for a detected content change.
pub const CHANGE_SUBJECT: &str = "🏠 New Apartment Update!";
/// Subject line for a missing listing section.
pub const ERROR_SUBJECT: &str = "⚠ Bot Error";
/// Body for a missing listing section.
pub const ERROR_BODY: &str =
    "❌ Could not find the listing section. Website structure might have changed.";

/// Which event a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// The monitored section changed (or was seen for the first time).
    Change,
    /// The monitored section could not be located.
    Error,
}

/// A message ready for delivery through a [`NotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
}

impl NotificationPayload {
    /// Build the change notification carrying the full new snapshot and the page URL.
    pub fn change(snapshot: &str, url: &str) -> Self {
        Self {
            kind: NotificationKind::Change,
            subject: CHANGE_SUBJECT.to_string(),
            body: format!("{snapshot}\n\nCheck here: {url}"),
        }
    }

    /// Build the fixed notification sent when the listing section is missing.
    pub fn structure_error() -> Self {
        Self {
            kind: NotificationKind::Error,
            subject: ERROR_SUBJECT.to_string(),
            body: ERROR_BODY.to_string(),
        }
    }

    /// Single-message rendering for channels without a subject line (chat).
    /// Change notices put the subject on its own line; the error notice is a
    /// single `subject: body` line.
    ///
    /// ```
    /// use pagewatch_common::NotificationPayload;
    ///
    /// let text = NotificationPayload::structure_error().as_text();
    /// assert!(text.starts_with("⚠ Bot Error: ❌"));
    /// ```
    pub fn as_text(&self) -> String {
        match self.kind {
            NotificationKind::Change => format!("{}\n\n{}", self.subject, self.body),
            NotificationKind::Error => format!("{}: {}", self.subject, self.body),
        }
    }
}

/// Reasons a notification was not delivered. Never fatal to a run.
#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    /// The backend is not configured; no network call was attempted.
    #[error("missing credentials for {0}")]
    MissingCredentials(&'static str),

    /// The message could not be built or sent (network, TLS, SMTP session).
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote service answered but refused the message.
    #[error("rejected by provider: {0}")]
    Rejected(String),
}

/// Delivery capability used by the monitor.
///
/// Exactly one implementation is active per deployment; it is chosen once at
/// startup and never switched mid-run.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `payload`. Errors are reported to the caller, which only logs them.
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError>;

    /// Short backend name for logs (`telegram`, `sendgrid`, `smtp-ssl`, ...).
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_payload_embeds_snapshot_and_url() {
        let p = NotificationPayload::change("Apt A\nApt C", "https://example.org/x");
        assert_eq!(p.subject, CHANGE_SUBJECT);
        assert_eq!(p.body, "Apt A\nApt C\n\nCheck here: https://example.org/x");
    }

    #[test]
    fn structure_error_is_fixed() {
        let a = NotificationPayload::structure_error();
        let b = NotificationPayload::structure_error();
        assert_eq!(a, b);
        assert_eq!(a.kind, NotificationKind::Error);
        assert_eq!(a.body, ERROR_BODY);
    }

    #[test]
    fn chat_rendering_per_kind() {
        let change = NotificationPayload::change("Apt A", "https://example.org/x");
        assert_eq!(
            change.as_text(),
            "🏠 New Apartment Update!\n\nApt A\n\nCheck here: https://example.org/x"
        );
        assert_eq!(
            NotificationPayload::structure_error().as_text(),
            "⚠ Bot Error: ❌ Could not find the listing section. Website structure might have changed."
        );
    }

    #[test]
    fn notify_error_messages_name_the_backend() {
        let e = NotifyError::MissingCredentials("telegram");
        assert_eq!(e.to_string(), "missing credentials for telegram");
    }
}
