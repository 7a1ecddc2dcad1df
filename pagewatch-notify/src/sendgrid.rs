//! SendGrid v3 mail API backend. Success is `202 Accepted` with an empty body.

use async_trait::async_trait;
use pagewatch_common::{NotificationPayload, NotificationSink, NotifyError};
use pagewatch_http::{Auth, HttpClient};
use serde::Serialize;

use crate::http_to_notify;

const MAIL_SEND_PATH: &str = "/v3/mail/send";

pub struct SendGridSink {
    client: HttpClient,
    api_key: Option<String>,
    sender: Option<String>,
    recipient: Option<String>,
}

#[derive(Serialize)]
struct MailSend<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

impl<'a> MailSend<'a> {
    fn plain(sender: &'a str, recipient: &'a str, payload: &'a NotificationPayload) -> Self {
        Self {
            personalizations: [Personalization {
                to: [Address { email: recipient }],
            }],
            from: Address { email: sender },
            subject: &payload.subject,
            content: [Content {
                kind: "text/plain",
                value: &payload.body,
            }],
        }
    }
}

impl SendGridSink {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        sender: Option<String>,
        recipient: Option<String>,
    ) -> Result<Self, NotifyError> {
        let client = HttpClient::new(api_base).map_err(http_to_notify)?;
        Ok(Self {
            client,
            api_key,
            sender,
            recipient,
        })
    }
}

#[async_trait]
impl NotificationSink for SendGridSink {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let (Some(key), Some(sender), Some(recipient)) =
            (&self.api_key, &self.sender, &self.recipient)
        else {
            return Err(NotifyError::MissingCredentials("sendgrid"));
        };

        let body = MailSend::plain(sender, recipient, payload);
        self.client
            .post_json_no_content(MAIL_SEND_PATH, Auth::Bearer(key), &body)
            .await
            .map_err(http_to_notify)?;

        tracing::info!(recipient = %recipient, "notify.sendgrid.sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_is_plain_text_mail() {
        let payload = NotificationPayload::structure_error();
        let body = MailSend::plain("bot@example.org", "me@example.org", &payload);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "personalizations": [{"to": [{"email": "me@example.org"}]}],
                "from": {"email": "bot@example.org"},
                "subject": "⚠ Bot Error",
                "content": [{
                    "type": "text/plain",
                    "value": "❌ Could not find the listing section. Website structure might have changed."
                }]
            })
        );
    }

    #[tokio::test]
    async fn each_field_is_required() {
        let full = || (Some("k".to_string()), Some("s@x.org".to_string()), Some("r@x.org".to_string()));
        for missing in 0..3 {
            let (mut k, mut s, mut r) = full();
            match missing {
                0 => k = None,
                1 => s = None,
                _ => r = None,
            }
            let sink = SendGridSink::new("http://127.0.0.1:9", k, s, r).unwrap();
            let err = sink
                .notify(&NotificationPayload::structure_error())
                .await
                .unwrap_err();
            assert!(matches!(err, NotifyError::MissingCredentials("sendgrid")));
        }
    }
}
