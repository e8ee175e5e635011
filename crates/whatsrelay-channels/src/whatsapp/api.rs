use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;
use whatsrelay_common::{Error, OutboundMessage, Result};
use whatsrelay_config::WhatsAppConfig;

use crate::traits::ChannelSender;

/// Sends text replies through the Graph API `/<phone_number_id>/messages` endpoint.
#[derive(Clone)]
pub struct WhatsAppSender {
    client: Client,
    messages_url: String,
    access_token: String,
}

impl WhatsAppSender {
    pub fn new(config: &WhatsAppConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build WhatsApp HTTP client: {e}")))?;

        let version = config.api_version.trim_start_matches('v');
        let messages_url = format!(
            "{}/v{}/{}/messages",
            config.api_base_url.trim_end_matches('/'),
            version,
            config.phone_number_id
        );

        Ok(Self {
            client,
            messages_url,
            access_token: config.access_token.clone(),
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextPayload<'a>,
}

#[derive(Serialize)]
struct TextPayload<'a> {
    preview_url: bool,
    body: &'a str,
}

#[async_trait]
impl ChannelSender for WhatsAppSender {
    fn channel_type(&self) -> &str {
        "whatsapp"
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<()> {
        let request = SendTextRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: &message.recipient_id,
            kind: "text",
            text: TextPayload {
                preview_url: false,
                body: &message.text,
            },
        };

        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("WhatsApp send failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "WhatsApp API error ({status}): {error_text}"
            )));
        }

        info!(
            "whatsapp: reply sent to {} ({} chars)",
            message.recipient_id,
            message.text.chars().count()
        );
        Ok(())
    }
}
