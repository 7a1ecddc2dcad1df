//! Delivery backends for [`pagewatch_common::NotificationSink`].
//!
//! One backend is selected at startup from [`NotifierConfig`] via
//! [`build_sink`]:
//!
//! - [`telegram::TelegramSink`]: chat message through the Bot API
//! - [`sendgrid::SendGridSink`]: transactional email over HTTPS
//! - [`smtp::SmtpSink`]: authenticated SMTP, implicit TLS or STARTTLS
//!
//! # Examples
//! ```
//! use pagewatch_config::NotifierConfig;
//!
//! let cfg = NotifierConfig::from_lookup(|_| None);
//! let sink = pagewatch_notify::build_sink(&cfg).unwrap();
//! assert_eq!(sink.name(), "telegram");
//! ```
pub mod sendgrid;
pub mod smtp;
pub mod telegram;

use std::sync::Arc;

use pagewatch_common::{NotificationSink, NotifyError};
use pagewatch_config::NotifierConfig;
use pagewatch_http::HttpError;

use sendgrid::SendGridSink;
use smtp::SmtpSink;
use telegram::TelegramSink;

/// Construct the configured backend. Fails only when an API base URL is invalid;
/// missing credentials are reported later, on each send.
pub fn build_sink(config: &NotifierConfig) -> Result<Arc<dyn NotificationSink>, NotifyError> {
    let sink: Arc<dyn NotificationSink> = match config {
        NotifierConfig::Telegram {
            bot_token,
            chat_id,
            api_base,
        } => Arc::new(TelegramSink::new(
            api_base,
            bot_token.clone(),
            chat_id.clone(),
        )?),
        NotifierConfig::Sendgrid {
            api_key,
            sender,
            recipient,
            api_base,
        } => Arc::new(SendGridSink::new(
            api_base,
            api_key.clone(),
            sender.clone(),
            recipient.clone(),
        )?),
        NotifierConfig::Smtp {
            address,
            password,
            recipient,
            host,
            security,
            port,
        } => Arc::new(
            SmtpSink::new(host.clone(), *security, address.clone(), password.clone())
                .with_recipient(recipient.clone())
                .with_port(*port),
        ),
    };
    tracing::info!(backend = sink.name(), "notify.backend.selected");
    Ok(sink)
}

/// Provider refusals become [`NotifyError::Rejected`]; everything else is transport.
pub(crate) fn http_to_notify(e: HttpError) -> NotifyError {
    if e.status().is_some() {
        NotifyError::Rejected(e.to_string())
    } else {
        NotifyError::Transport(e.to_string())
    }
}
