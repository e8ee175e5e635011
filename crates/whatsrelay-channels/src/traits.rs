use async_trait::async_trait;
use whatsrelay_common::{OutboundMessage, Result};

/// Send-only interface for delivering outbound messages through a channel.
///
/// Designed to be wrapped in `Arc` and shared across webhook tasks.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Unique identifier for this channel type.
    fn channel_type(&self) -> &str;

    /// Send a message through this channel.
    async fn send_message(&self, message: &OutboundMessage) -> Result<()>;
}
