//! Telegram Bot API backend.

use async_trait::async_trait;
use pagewatch_common::{NotificationPayload, NotificationSink, NotifyError};
use pagewatch_http::{Auth, HttpClient};
use serde::{Deserialize, Serialize};

use crate::http_to_notify;

pub struct TelegramSink {
    client: HttpClient,
    bot_token: Option<String>,
    chat_id: Option<String>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
}

#[derive(Debug, Deserialize)]
struct BotReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramSink {
    pub fn new(
        api_base: &str,
        bot_token: Option<String>,
        chat_id: Option<String>,
    ) -> Result<Self, NotifyError> {
        let client = HttpClient::new(api_base).map_err(http_to_notify)?;
        Ok(Self {
            client,
            bot_token,
            chat_id,
        })
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let (Some(token), Some(chat_id)) = (&self.bot_token, &self.chat_id) else {
            return Err(NotifyError::MissingCredentials("telegram"));
        };

        let body = SendMessage {
            chat_id,
            text: payload.as_text(),
        };
        // The token is a path segment; the http layer redacts it from logs.
        let reply: BotReply = self
            .client
            .post_json(&format!("/bot{token}/sendMessage"), Auth::None, &body)
            .await
            .map_err(http_to_notify)?;

        if !reply.ok {
            return Err(NotifyError::Rejected(
                reply.description.unwrap_or_else(|| "ok=false".to_string()),
            ));
        }
        tracing::info!(chat_id = %chat_id, "notify.telegram.sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
