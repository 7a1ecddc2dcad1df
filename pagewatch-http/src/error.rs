use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::redact::snip_body;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error envelopes of the providers we talk to. Tried in declaration order.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    /// Telegram: `{"ok":false,"error_code":400,"description":"..."}`
    Bot { description: String },
    /// SendGrid: `{"errors":[{"message":"...","field":"from"}]}`
    List { errors: Vec<ListItem> },
    Message { message: String },
    Detail { detail: String },
    Error { error: String },
}

#[derive(Deserialize)]
struct ListItem {
    #[serde(default)]
    message: String,
    #[serde(default)]
    field: Option<String>,
}

/// Best human-readable reason found in a non-2xx body; falls back to a snippet.
pub(crate) fn provider_message(body: &[u8]) -> String {
    let found = match serde_json::from_slice::<Envelope>(body) {
        Ok(Envelope::Bot { description }) => description,
        Ok(Envelope::List { errors }) => errors
            .into_iter()
            .next()
            .map(|item| match item.field.filter(|f| !f.is_empty()) {
                Some(field) => format!("{} ({field})", item.message),
                None => item.message,
            })
            .unwrap_or_default(),
        Ok(Envelope::Message { message: m })
        | Ok(Envelope::Detail { detail: m })
        | Ok(Envelope::Error { error: m }) => m,
        Err(_) => String::new(),
    };
    if found.is_empty() {
        snip_body(body)
    } else {
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_description_is_used() {
        let body = br#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        assert_eq!(provider_message(body), "Bad Request: chat not found");
    }

    #[test]
    fn sendgrid_first_error_carries_field() {
        let body = br#"{"errors":[{"message":"The from address does not match a verified Sender Identity.","field":"from","help":null}]}"#;
        assert_eq!(
            provider_message(body),
            "The from address does not match a verified Sender Identity. (from)"
        );
        let no_field = br#"{"errors":[{"message":"Permission denied","field":null}]}"#;
        assert_eq!(provider_message(no_field), "Permission denied");
    }

    #[test]
    fn generic_shapes_and_plain_bodies() {
        assert_eq!(provider_message(br#"{"detail":"nope"}"#), "nope");
        assert_eq!(provider_message(br#"{"error":"bad"}"#), "bad");
        assert_eq!(provider_message(b"<html>502</html>"), "<html>502</html>");
        assert_eq!(provider_message(br#"{"errors":[]}"#), r#"{"errors":[]}"#);
    }

    #[test]
    fn status_only_for_api_errors() {
        let e = HttpError::Api {
            status: StatusCode::FORBIDDEN,
            message: "x".into(),
            request_id: "-".into(),
        };
        assert_eq!(e.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(HttpError::Network("x".into()).status(), None);
    }
}
