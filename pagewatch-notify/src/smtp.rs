//! Authenticated SMTP backend (`lettre`), implicit TLS or STARTTLS.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use pagewatch_common::{NotificationPayload, NotificationSink, NotifyError};
use pagewatch_config::SmtpSecurity;

pub struct SmtpSink {
    host: String,
    security: SmtpSecurity,
    port: u16,
    address: Option<String>,
    password: Option<String>,
    recipient: Option<String>,
}

impl SmtpSink {
    /// Mail goes to `address` itself unless [`SmtpSink::with_recipient`] says otherwise.
    pub fn new(
        host: impl Into<String>,
        security: SmtpSecurity,
        address: Option<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            host: host.into(),
            security,
            port: security.default_port(),
            recipient: address.clone(),
            address,
            password,
        }
    }

    pub fn with_recipient(mut self, recipient: Option<String>) -> Self {
        if recipient.is_some() {
            self.recipient = recipient;
        }
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn build_message(
        from: &str,
        to: &str,
        payload: &NotificationPayload,
    ) -> Result<Message, NotifyError> {
        let parse = |raw: &str| {
            raw.parse::<Mailbox>()
                .map_err(|e| NotifyError::Transport(format!("invalid address {raw:?}: {e}")))
        };
        Message::builder()
            .from(parse(from)?)
            .to(parse(to)?)
            .subject(payload.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(payload.body.clone())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }

    fn transport(
        &self,
        address: &str,
        password: &str,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let builder = match self.security {
            SmtpSecurity::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host),
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            }
        }
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(builder
            .port(self.port)
            .credentials(Credentials::new(address.to_string(), password.to_string()))
            .build())
    }
}

#[async_trait]
impl NotificationSink for SmtpSink {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let (Some(address), Some(password), Some(recipient)) =
            (&self.address, &self.password, &self.recipient)
        else {
            return Err(NotifyError::MissingCredentials("smtp"));
        };

        let message = Self::build_message(address, recipient, payload)?;
        let transport = self.transport(address, password)?;

        tracing::debug!(host = %self.host, port = self.port, security = self.name(), "notify.smtp.connect");
        let response = transport.send(message).await.map_err(|e| {
            if e.is_permanent() {
                NotifyError::Rejected(e.to_string())
            } else {
                NotifyError::Transport(e.to_string())
            }
        })?;

        tracing::info!(
            recipient = %recipient,
            code = %response.code(),
            "notify.smtp.sent"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        match self.security {
            SmtpSecurity::Ssl => "smtp-ssl",
            SmtpSecurity::StartTls => "smtp-starttls",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    fn sink(security: SmtpSecurity) -> SmtpSink {
        SmtpSink::new(
            "127.0.0.1",
            security,
            Some("me@example.org".into()),
            Some("app-pass".into()),
        )
    }

    #[test]
    fn ports_follow_security_mode() {
        assert_eq!(sink(SmtpSecurity::Ssl).port(), 465);
        assert_eq!(sink(SmtpSecurity::StartTls).port(), 587);
        assert_eq!(sink(SmtpSecurity::Ssl).with_port(Some(2465)).port(), 2465);
        assert_eq!(sink(SmtpSecurity::Ssl).with_port(None).port(), 465);
    }

    #[test]
    fn recipient_defaults_to_sender() {
        let s = sink(SmtpSecurity::Ssl);
        assert_eq!(s.recipient.as_deref(), Some("me@example.org"));
        let s = s.with_recipient(Some("other@example.org".into()));
        assert_eq!(s.recipient.as_deref(), Some("other@example.org"));
    }

    #[test]
    fn message_carries_subject_and_plain_body() {
        let payload = NotificationPayload::change("Apt A", "https://example.org");
        let msg = SmtpSink::build_message("me@example.org", "you@example.org", &payload).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("From: me@example.org"));
        assert!(raw.contains("To: you@example.org"));
        assert!(raw.contains("Content-Type: text/plain"));
    }

    #[tokio::test]
    async fn missing_password_short_circuits() {
        let s = SmtpSink::new("127.0.0.1", SmtpSecurity::Ssl, Some("me@example.org".into()), None);
        let err = s
            .notify(&NotificationPayload::structure_error())
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::MissingCredentials("smtp")));
    }

    #[tokio::test]
    async fn bad_address_fails_before_connecting() {
        let s = SmtpSink::new(
            "127.0.0.1",
            SmtpSecurity::StartTls,
            Some("not-an-address".into()),
            Some("pw".into()),
        );
        let err = s
            .notify(&NotificationPayload::structure_error())
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Transport(m) if m.contains("invalid address")));
    }

    /// Runs `notify` against a local listener and returns what the client sends first.
    async fn opening_bytes(security: SmtpSecurity) -> Vec<u8> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = sink(security).with_port(Some(port));
        let task = tokio::spawn(async move {
            client
                .notify(&NotificationPayload::structure_error())
                .await
        });

        let (mut stream, _) = timeout(Duration::from_secs(10), listener.accept())
            .await
            .expect("client connects")
            .unwrap();
        if security == SmtpSecurity::StartTls {
            stream.write_all(b"220 localhost ESMTP\r\n").await.unwrap();
        }
        let mut buf = [0u8; 64];
        let n = timeout(Duration::from_secs(10), stream.read(&mut buf))
            .await
            .expect("client speaks first after greeting")
            .unwrap();
        task.abort();
        buf[..n].to_vec()
    }

    #[test]
    fn transport_builds_for_both_modes() {
        for security in [SmtpSecurity::Ssl, SmtpSecurity::StartTls] {
            assert!(sink(security).transport("me@example.org", "app-pass").is_ok());
        }
    }

    #[tokio::test]
    async fn ssl_mode_opens_with_a_tls_handshake() {
        let bytes = opening_bytes(SmtpSecurity::Ssl).await;
        // TLS record type 0x16 is a handshake; plaintext SMTP would wait for a greeting.
        assert_eq!(bytes.first(), Some(&0x16), "{bytes:?}");
    }

    #[tokio::test]
    async fn starttls_mode_greets_in_plaintext() {
        let bytes = opening_bytes(SmtpSecurity::StartTls).await;
        let line = String::from_utf8_lossy(&bytes);
        assert!(line.starts_with("EHLO "), "{line:?}");
    }
}
