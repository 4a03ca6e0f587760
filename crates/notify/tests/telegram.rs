//! Telegram Bot API gateway tests against a mock server.

use std::time::Duration;

use notify::{ChannelError, ChatId, Gateway, InlineKeyboard, MessageHandle, OutboundMessage, TelegramChannel};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123:secret";

async fn channel() -> (MockServer, TelegramChannel) {
    let server = MockServer::start().await;
    let channel = TelegramChannel::with_api_url(TOKEN, server.uri());
    (server, channel)
}

#[tokio::test]
async fn test_send_message_posts_html_and_returns_handle() {
    let (server, channel) = channel().await;

    Mock::given(method("POST"))
        .and(path("/bot123:secret/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": "-100",
            "text": "<b>hi</b>",
            "parse_mode": "HTML",
            "link_preview_options": { "is_disabled": true },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 42, "chat": { "id": -100 }, "text": "hi" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let handle = channel
        .send_message(&ChatId::from(-100), &OutboundMessage::text("<b>hi</b>"))
        .await
        .unwrap();
    assert_eq!(handle, MessageHandle(42));
}

#[tokio::test]
async fn test_send_message_includes_inline_keyboard() {
    let (server, channel) = channel().await;

    Mock::given(method("POST"))
        .and(path("/bot123:secret/sendMessage"))
        .and(body_partial_json(json!({
            "reply_markup": {
                "inline_keyboard": [[{ "text": "Delete", "callback_data": "domain:del:abc" }]]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 7, "chat": { "id": 1 } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let message = OutboundMessage::text("down")
        .with_keyboard(InlineKeyboard::single("Delete", "domain:del:abc"));
    channel.send_message(&ChatId::from(1), &message).await.unwrap();
}

#[tokio::test]
async fn test_edit_message_targets_the_handle() {
    let (server, channel) = channel().await;

    Mock::given(method("POST"))
        .and(path("/bot123:secret/editMessageText"))
        .and(body_partial_json(json!({ "chat_id": "-100", "message_id": 42 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 42, "chat": { "id": -100 } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    channel
        .edit_message(&ChatId::from(-100), MessageHandle(42), &OutboundMessage::text("v2"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unchanged_edit_is_not_an_error() {
    let (server, channel) = channel().await;

    Mock::given(method("POST"))
        .and(path("/bot123:secret/editMessageText"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
        })))
        .mount(&server)
        .await;

    channel
        .edit_message(&ChatId::from(1), MessageHandle(1), &OutboundMessage::text("same"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_api_errors_are_reported() {
    let (server, channel) = channel().await;

    Mock::given(method("POST"))
        .and(path("/bot123:secret/sendMessage"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let err = channel
        .send_message(&ChatId::from(1), &OutboundMessage::text("x"))
        .await
        .unwrap_err();
    match err {
        ChannelError::Api {
            method,
            code,
            description,
        } => {
            assert_eq!(method, "sendMessage");
            assert_eq!(code, 400);
            assert!(description.contains("chat not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limits_surface_retry_after() {
    let (server, channel) = channel().await;

    Mock::given(method("POST"))
        .and(path("/bot123:secret/sendMessage"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 5",
            "parameters": { "retry_after": 5 }
        })))
        .mount(&server)
        .await;

    let err = channel
        .send_message(&ChatId::from(1), &OutboundMessage::text("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::RateLimited { retry_after_secs: 5 }));
}

#[tokio::test]
async fn test_errors_do_not_leak_the_token() {
    let (server, channel) = channel().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = channel
        .send_message(&ChatId::from(1), &OutboundMessage::text("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Http(_)));
    assert!(!err.to_string().contains("secret"));
}

#[tokio::test]
async fn test_get_updates_parses_commands_and_callbacks() {
    let (server, channel) = channel().await;

    Mock::given(method("POST"))
        .and(path("/bot123:secret/getUpdates"))
        .and(body_partial_json(json!({ "offset": 10, "timeout": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {
                    "update_id": 10,
                    "message": {
                        "message_id": 1,
                        "chat": { "id": -100 },
                        "from": { "id": 5, "first_name": "Ann" },
                        "text": "/add https://x.test"
                    }
                },
                {
                    "update_id": 11,
                    "callback_query": {
                        "id": "q",
                        "from": { "id": 5, "first_name": "Ann" },
                        "message": { "message_id": 2, "chat": { "id": -100 } },
                        "data": "domain:del:0123456789ab"
                    }
                }
            ]
        })))
        .mount(&server)
        .await;

    let updates = channel.get_updates(10, Duration::ZERO).await.unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(
        updates[0].message.as_ref().and_then(|m| m.text.as_deref()),
        Some("/add https://x.test")
    );
    assert_eq!(
        updates[1].callback_query.as_ref().and_then(|q| q.data.as_deref()),
        Some("domain:del:0123456789ab")
    );
}
