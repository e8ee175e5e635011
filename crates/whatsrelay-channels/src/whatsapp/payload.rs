//! WhatsApp Cloud API webhook payloads.
//!
//! Only `entry[0].changes[0].value` is inspected. Unknown fields are ignored.

use serde::Deserialize;
use whatsrelay_common::{Error, InboundMessage, MessageContent, Result};

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    value: Option<ChangeValue>,
}

#[derive(Debug, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    messages: Vec<RawMessage>,
    #[serde(default)]
    statuses: Vec<StatusUpdate>,
    #[serde(default)]
    errors: Vec<PlatformError>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    from: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<RawText>,
}

#[derive(Debug, Deserialize)]
struct RawText {
    body: Option<String>,
}

/// Delivery status report for a previously sent message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusUpdate {
    pub id: Option<String>,
    pub status: Option<String>,
    pub recipient_id: Option<String>,
}

/// Error object reported by the platform inside a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlatformError {
    pub code: Option<i64>,
    pub title: Option<String>,
    pub message: Option<String>,
}

/// The parts of one webhook delivery the relay cares about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WebhookEvent {
    /// First message in the delivery, if any.
    pub message: Option<InboundMessage>,
    pub statuses: Vec<StatusUpdate>,
    pub errors: Vec<PlatformError>,
}

/// Parse a raw webhook body.
///
/// Returns [`Error::MalformedEvent`] for invalid JSON, a missing
/// `entry[0].changes[0].value`, a message without sender, or a text message
/// without body.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent> {
    let payload: WebhookPayload = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedEvent(format!("invalid JSON body: {e}")))?;

    let value = payload
        .entry
        .into_iter()
        .next()
        .and_then(|entry| entry.changes.into_iter().next())
        .and_then(|change| change.value)
        .ok_or_else(|| Error::MalformedEvent("missing entry[0].changes[0].value".into()))?;

    let message = value
        .messages
        .into_iter()
        .next()
        .map(convert_message)
        .transpose()?;

    Ok(WebhookEvent {
        message,
        statuses: value.statuses,
        errors: value.errors,
    })
}

fn convert_message(raw: RawMessage) -> Result<InboundMessage> {
    let sender_id = raw
        .from
        .filter(|from| !from.is_empty())
        .ok_or_else(|| Error::MalformedEvent("message has no sender".into()))?;

    let kind = raw.kind.unwrap_or_else(|| "unknown".to_string());
    let content = if kind == "text" {
        let body = raw
            .text
            .and_then(|text| text.body)
            .ok_or_else(|| Error::MalformedEvent("text message has no body".into()))?;
        MessageContent::Text(body)
    } else {
        MessageContent::Unsupported(kind)
    };

    Ok(InboundMessage { sender_id, content })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: serde_json::Value) -> Vec<u8> {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "102290129340398",
                "changes": [{ "field": "messages", "value": value }]
            }]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn extracts_text_message() {
        let body = envelope(json!({
            "messaging_product": "whatsapp",
            "metadata": {"display_phone_number": "15550783881", "phone_number_id": "106540352242922"},
            "contacts": [{"profile": {"name": "Kerry"}, "wa_id": "16505551234"}],
            "messages": [{
                "from": "16505551234",
                "id": "wamid.HBgLMTY1MDM4Nzk0MzkVAgASGBQzQTRBNjU5OUFFRTAzODEwMTQ0RgA=",
                "timestamp": "1749416383",
                "type": "text",
                "text": {"body": "Does it come in another color?"}
            }]
        }));

        let event = parse_event(&body).unwrap();
        assert_eq!(
            event.message,
            Some(InboundMessage {
                sender_id: "16505551234".into(),
                content: MessageContent::Text("Does it come in another color?".into()),
            })
        );
        assert!(event.statuses.is_empty());
    }

    #[test]
    fn non_text_message_is_unsupported() {
        let body = envelope(json!({
            "messages": [{
                "from": "16505551234",
                "type": "image",
                "image": {"id": "1234", "mime_type": "image/jpeg"}
            }]
        }));

        let message = parse_event(&body).unwrap().message.unwrap();
        assert_eq!(message.content, MessageContent::Unsupported("image".into()));
    }

    #[test]
    fn status_only_delivery_has_no_message() {
        let body = envelope(json!({
            "statuses": [{
                "id": "wamid.abc",
                "status": "delivered",
                "timestamp": "1749416400",
                "recipient_id": "16505551234"
            }]
        }));

        let event = parse_event(&body).unwrap();
        assert!(event.message.is_none());
        assert_eq!(event.statuses.len(), 1);
        assert_eq!(event.statuses[0].status.as_deref(), Some("delivered"));
    }

    #[test]
    fn platform_errors_are_collected() {
        let body = envelope(json!({
            "errors": [{"code": 131051, "title": "Message type unknown", "message": "Message type unknown"}]
        }));

        let event = parse_event(&body).unwrap();
        assert_eq!(event.errors[0].code, Some(131051));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_event(b"{not json").unwrap_err();
        assert!(matches!(err, Error::MalformedEvent(_)));
    }

    #[test]
    fn missing_entry_is_malformed() {
        let err = parse_event(br#"{"object": "whatsapp_business_account"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedEvent(_)));
    }

    #[test]
    fn text_without_body_is_malformed() {
        let body = envelope(json!({
            "messages": [{"from": "16505551234", "type": "text"}]
        }));
        let err = parse_event(&body).unwrap_err();
        assert!(err.to_string().contains("no body"));
    }

    #[test]
    fn message_without_sender_is_malformed() {
        let body = envelope(json!({
            "messages": [{"type": "text", "text": {"body": "hi"}}]
        }));
        let err = parse_event(&body).unwrap_err();
        assert!(err.to_string().contains("no sender"));
    }
}
