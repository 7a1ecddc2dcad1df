use pagewatch_common::{NotificationPayload, NotificationSink, NotifyError};
use pagewatch_notify::sendgrid::SendGridSink;
use pagewatch_notify::telegram::TelegramSink;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123456:ABC-def";

fn change() -> NotificationPayload {
    NotificationPayload::change("Apt A\nApt B", "https://example.org/listings")
}

#[tokio::test]
async fn telegram_posts_subject_and_body_as_one_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_json(json!({
            "chat_id": "-1001",
            "text": "🏠 New Apartment Update!\n\nApt A\nApt B\n\nCheck here: https://example.org/listings"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"message_id": 7}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = TelegramSink::new(&server.uri(), Some(TOKEN.into()), Some("-1001".into())).unwrap();
    sink.notify(&change()).await.unwrap();
}

#[tokio::test]
async fn telegram_structure_error_reads_as_one_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_json(json!({
            "chat_id": "-1001",
            "text": "⚠ Bot Error: ❌ Could not find the listing section. Website structure might have changed."
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let sink = TelegramSink::new(&server.uri(), Some(TOKEN.into()), Some("-1001".into())).unwrap();
    sink.notify(&NotificationPayload::structure_error()).await.unwrap();
}

#[tokio::test]
async fn telegram_error_description_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = TelegramSink::new(&server.uri(), Some(TOKEN.into()), Some("1".into())).unwrap();
    let err = sink.notify(&change()).await.unwrap_err();
    match err {
        NotifyError::Rejected(msg) => {
            assert!(msg.contains("chat not found"), "{msg}");
            assert!(!msg.contains(TOKEN), "token leaked: {msg}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn telegram_ok_false_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .mount(&server)
        .await;

    let sink = TelegramSink::new(&server.uri(), Some(TOKEN.into()), Some("1".into())).unwrap();
    assert!(matches!(
        sink.notify(&change()).await,
        Err(NotifyError::Rejected(m)) if m.contains("blocked")
    ));
}

#[tokio::test]
async fn sendgrid_sends_bearer_authenticated_mail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("authorization", "Bearer SG.test-key"))
        .and(body_json(json!({
            "personalizations": [{"to": [{"email": "me@example.org"}]}],
            "from": {"email": "bot@example.org"},
            "subject": "🏠 New Apartment Update!",
            "content": [{
                "type": "text/plain",
                "value": "Apt A\nApt B\n\nCheck here: https://example.org/listings"
            }]
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let sink = SendGridSink::new(
        &server.uri(),
        Some("SG.test-key".into()),
        Some("bot@example.org".into()),
        Some("me@example.org".into()),
    )
    .unwrap();
    sink.notify(&change()).await.unwrap();
}

#[tokio::test]
async fn sendgrid_unverified_sender_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errors": [{
                "message": "The from address does not match a verified Sender Identity.",
                "field": "from",
                "help": null
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = SendGridSink::new(
        &server.uri(),
        Some("SG.test-key".into()),
        Some("nobody@example.org".into()),
        Some("me@example.org".into()),
    )
    .unwrap();
    let err = sink
        .notify(&NotificationPayload::structure_error())
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Rejected(m) if m.contains("verified Sender Identity")));
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_error() {
    let sink = TelegramSink::new("http://127.0.0.1:9", Some(TOKEN.into()), Some("1".into())).unwrap();
    assert!(matches!(
        sink.notify(&change()).await,
        Err(NotifyError::Transport(_))
    ));
}
