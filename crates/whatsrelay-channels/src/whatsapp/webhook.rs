use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use whatsrelay_common::{Error, MessageContent, OutboundMessage};

use super::WhatsAppOnMessageFn;
use super::payload::{WebhookEvent, parse_event};
use crate::traits::ChannelSender;

/// Largest webhook body read before the delivery is dropped as malformed.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared state for the WhatsApp webhook routes.
#[derive(Clone)]
pub struct WhatsAppState {
    verify_token: Arc<str>,
    fallback_reply: Arc<str>,
    on_message: WhatsAppOnMessageFn,
    sender: Arc<dyn ChannelSender>,
    max_body_bytes: usize,
    tasks: TaskTracker,
}

impl WhatsAppState {
    pub fn new(
        verify_token: impl Into<Arc<str>>,
        fallback_reply: impl Into<Arc<str>>,
        on_message: WhatsAppOnMessageFn,
        sender: Arc<dyn ChannelSender>,
    ) -> Self {
        Self {
            verify_token: verify_token.into(),
            fallback_reply: fallback_reply.into(),
            on_message,
            sender,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            tasks: TaskTracker::new(),
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// The challenge to echo back, when `params` carry a matching subscribe request.
    fn verify(&self, params: &HashMap<String, String>) -> Option<String> {
        let subscribed = params.get("hub.mode").map(String::as_str) == Some("subscribe");
        let token_matches =
            params.get("hub.verify_token").map(String::as_str) == Some(&*self.verify_token);
        (subscribed && token_matches)
            .then(|| params.get("hub.challenge").cloned().unwrap_or_default())
    }

    /// Log what the delivery carries and, for a text message, spawn the reply task.
    ///
    /// Returns the handle of the spawned task, if any.
    pub fn dispatch_event(&self, event: WebhookEvent) -> Option<JoinHandle<()>> {
        for status in &event.statuses {
            info!(
                "whatsapp: message {} to {} is {}",
                status.id.as_deref().unwrap_or("?"),
                status.recipient_id.as_deref().unwrap_or("?"),
                status.status.as_deref().unwrap_or("unknown")
            );
        }
        for err in &event.errors {
            warn!(
                "whatsapp: platform reported error {}: {}",
                err.code.unwrap_or_default(),
                err.message
                    .as_deref()
                    .or(err.title.as_deref())
                    .unwrap_or("no details")
            );
        }

        let Some(message) = event.message else {
            if event.statuses.is_empty() && event.errors.is_empty() {
                info!("whatsapp: webhook delivery contains no message");
            }
            return None;
        };

        match message.content {
            MessageContent::Text(text) => {
                info!(
                    "whatsapp: text message from {}: {} chars",
                    message.sender_id,
                    text.chars().count()
                );
                let state = self.clone();
                let sender_id = message.sender_id;
                Some(self.tasks.spawn(async move {
                    state.relay_text(&sender_id, &text).await;
                }))
            }
            MessageContent::Unsupported(kind) => {
                info!(
                    "whatsapp: ignoring '{}' message from {}",
                    kind, message.sender_id
                );
                None
            }
        }
    }

    /// Generate a reply (or the fallback) and send it back to `sender_id`.
    ///
    /// Send failures are logged only.
    pub async fn relay_text(&self, sender_id: &str, text: &str) {
        let reply = match (self.on_message)(sender_id.to_string(), text.to_string()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("whatsapp: reply generation failed, sending fallback: {e}");
                self.fallback_reply.to_string()
            }
        };

        let outbound = OutboundMessage::text(sender_id, reply);
        if let Err(e) = self.sender.send_message(&outbound).await {
            error!(
                "whatsapp: failed to send reply to {sender_id} via {}: {e}",
                self.sender.channel_type()
            );
        }
    }

    /// Stop tracking new work and wait up to `timeout` for in-flight replies.
    ///
    /// Returns `false` when replies were still running at the deadline.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.close();
        let pending = self.tasks.len();
        if pending > 0 {
            info!("whatsapp: waiting for {pending} in-flight replies");
        }
        tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok()
    }
}

/// GET /webhook: subscription handshake. Echoes `hub.challenge` when the token matches.
pub async fn whatsapp_verify(
    State(state): State<WhatsAppState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Response {
    let params = match query {
        Ok(Query(params)) => params,
        Err(e) => {
            warn!("whatsapp: unreadable verification query: {e}");
            HashMap::new()
        }
    };

    match state.verify(&params) {
        Some(challenge) => {
            info!("whatsapp: webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!("whatsapp: webhook verification failed");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhook: always acknowledged with 200; replies are sent in the background.
pub async fn whatsapp_webhook(State(state): State<WhatsAppState>, body: Body) -> StatusCode {
    let event = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => parse_event(&bytes),
        Err(e) => Err(Error::MalformedEvent(format!(
            "body unreadable or over {} bytes: {e}",
            state.max_body_bytes
        ))),
    };

    match event {
        Ok(event) => {
            state.dispatch_event(event);
        }
        Err(e) => warn!("whatsapp: ignoring webhook delivery: {e}"),
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use whatsrelay_common::{InboundMessage, Result};

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<OutboundMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl ChannelSender for RecordingSender {
        fn channel_type(&self) -> &str {
            "recording"
        }

        async fn send_message(&self, message: &OutboundMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail {
                return Err(Error::Channel("graph api down".into()));
            }
            Ok(())
        }
    }

    fn echo() -> WhatsAppOnMessageFn {
        Arc::new(|_sender, text| Box::pin(async move { Ok(format!("echo: {text}")) }))
    }

    fn failing() -> WhatsAppOnMessageFn {
        Arc::new(|_sender, _text| {
            Box::pin(async move { Err(Error::Completion("model unavailable".into())) })
        })
    }

    fn state(on_message: WhatsAppOnMessageFn, sender: Arc<RecordingSender>) -> WhatsAppState {
        WhatsAppState::new("secret", "Error generating the response.", on_message, sender)
    }

    const TEXT_DELIVERY: &str = r#"{"entry":[{"changes":[{"value":{"messages":[
        {"from":"1","type":"text","text":{"body":"hi"}}
    ]}}]}]}"#;

    fn text_event(body: &str) -> WebhookEvent {
        WebhookEvent {
            message: Some(InboundMessage {
                sender_id: "16505551234".into(),
                content: MessageContent::Text(body.into()),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn text_message_is_answered() {
        let sender = Arc::new(RecordingSender::default());
        let state = state(echo(), sender.clone());

        state.dispatch_event(text_event("hi")).unwrap().await.unwrap();

        let sent = sender.sent.lock().unwrap();
        assert_eq!(*sent, vec![OutboundMessage::text("16505551234", "echo: hi")]);
    }

    #[tokio::test]
    async fn failed_generation_sends_fallback() {
        let sender = Arc::new(RecordingSender::default());
        let state = state(failing(), sender.clone());

        state.dispatch_event(text_event("hi")).unwrap().await.unwrap();

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "Error generating the response.");
    }

    #[tokio::test]
    async fn non_text_message_spawns_nothing() {
        let sender = Arc::new(RecordingSender::default());
        let state = state(echo(), sender.clone());

        let event = WebhookEvent {
            message: Some(InboundMessage {
                sender_id: "16505551234".into(),
                content: MessageContent::Unsupported("image".into()),
            }),
            ..Default::default()
        };

        assert!(state.dispatch_event(event).is_none());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_swallowed() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let state = state(echo(), sender.clone());

        state.relay_text("16505551234", "hi").await;

        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn verification_requires_subscribe_and_matching_token() {
        let sender = Arc::new(RecordingSender::default());
        let state = state(echo(), sender);

        let params = |mode: Option<&str>, token: Option<&str>| {
            let mut params = HashMap::new();
            params.insert("hub.challenge".to_string(), "1158201444".to_string());
            if let Some(mode) = mode {
                params.insert("hub.mode".to_string(), mode.to_string());
            }
            if let Some(token) = token {
                params.insert("hub.verify_token".to_string(), token.to_string());
            }
            params
        };

        assert_eq!(
            state.verify(&params(Some("subscribe"), Some("secret"))),
            Some("1158201444".to_string())
        );
        assert!(state.verify(&params(Some("subscribe"), Some("WRONG"))).is_none());
        assert!(state.verify(&params(Some("unsubscribe"), Some("secret"))).is_none());
        assert!(state.verify(&params(None, None)).is_none());
    }

    #[tokio::test]
    async fn oversized_body_is_acknowledged_and_dropped() {
        let sender = Arc::new(RecordingSender::default());
        let state = state(echo(), sender.clone()).with_max_body_bytes(16);

        let status = whatsapp_webhook(State(state.clone()), Body::from(TEXT_DELIVERY)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(state.drain(Duration::from_secs(1)).await);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn body_within_limit_is_answered() {
        let sender = Arc::new(RecordingSender::default());
        let state = state(echo(), sender.clone());

        let status = whatsapp_webhook(State(state.clone()), Body::from(TEXT_DELIVERY)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(state.drain(Duration::from_secs(1)).await);
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![OutboundMessage::text("1", "echo: hi")]
        );
    }

    #[tokio::test]
    async fn drain_waits_for_in_flight_replies() {
        let sender = Arc::new(RecordingSender::default());
        let slow: WhatsAppOnMessageFn = Arc::new(|_sender, text| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(format!("slow: {text}"))
            })
        });
        let state = state(slow, sender.clone());

        assert!(state.dispatch_event(text_event("hi")).is_some());
        assert!(sender.sent.lock().unwrap().is_empty());

        assert!(state.drain(Duration::from_secs(5)).await);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn drain_gives_up_at_deadline() {
        let sender = Arc::new(RecordingSender::default());
        let stuck: WhatsAppOnMessageFn = Arc::new(|_sender, _text| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            })
        });
        let state = state(stuck, sender);

        state.dispatch_event(text_event("hi"));
        assert!(!state.drain(Duration::from_millis(20)).await);
    }
}
