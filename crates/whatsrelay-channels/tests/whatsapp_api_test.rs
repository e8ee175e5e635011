use std::time::Duration;

use serde_json::json;
use whatsrelay_channels::{ChannelSender, WhatsAppSender};
use whatsrelay_common::{Error, OutboundMessage};
use whatsrelay_config::WhatsAppConfig;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(base_url: String) -> WhatsAppConfig {
    WhatsAppConfig {
        verify_token: "verify-me".to_string(),
        phone_number_id: "106540352242922".to_string(),
        access_token: "EAAtest-token".to_string(),
        api_base_url: base_url,
        api_version: "v20.0".to_string(),
        max_body_bytes: whatsrelay_config::model::DEFAULT_WEBHOOK_MAX_BODY_BYTES,
    }
}

#[tokio::test]
async fn test_send_text_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v20.0/106540352242922/messages"))
        .and(header("Authorization", "Bearer EAAtest-token"))
        .and(body_json(json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": "16505551234",
            "type": "text",
            "text": {"preview_url": false, "body": "Blue and green"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messaging_product": "whatsapp",
            "contacts": [{"input": "16505551234", "wa_id": "16505551234"}],
            "messages": [{"id": "wamid.HBgLMTY1MDM4Nzk0MzkVAgARGBI3"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sender = WhatsAppSender::new(&config(mock_server.uri()), Duration::from_secs(5)).unwrap();
    sender
        .send_message(&OutboundMessage::text("16505551234", "Blue and green"))
        .await
        .unwrap();
}

#[test]
fn test_messages_url_normalizes_version() {
    let mut cfg = config("https://graph.facebook.com/".to_string());
    cfg.api_version = "20.0".to_string();

    let sender = WhatsAppSender::new(&cfg, Duration::from_secs(5)).unwrap();
    assert_eq!(
        sender.messages_url(),
        "https://graph.facebook.com/v20.0/106540352242922/messages"
    );
}

#[tokio::test]
async fn test_api_error_is_channel_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v20.0/106540352242922/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Error validating access token: Session has expired",
                "type": "OAuthException",
                "code": 190
            }
        })))
        .mount(&mock_server)
        .await;

    let sender = WhatsAppSender::new(&config(mock_server.uri()), Duration::from_secs(5)).unwrap();
    let err = sender
        .send_message(&OutboundMessage::text("16505551234", "hi"))
        .await
        .unwrap_err();

    match err {
        Error::Channel(message) => {
            assert!(message.contains("401"));
            assert!(message.contains("Session has expired"));
        }
        other => panic!("Expected channel failure, got {other:?}"),
    }
}
