use async_trait::async_trait;
use whatsrelay_common::Result;

/// Produces the reply text for one inbound text message.
///
/// Implemented by [`TurnAssembler`](crate::TurnAssembler) for live completions
/// and by [`FixedReply`] for a canned answer.
#[async_trait]
pub trait ReplyStrategy: Send + Sync {
    /// Short identifier used in logs ("completion", "fixed").
    fn name(&self) -> &str;

    async fn reply(&self, sender_id: &str, text: &str) -> Result<String>;
}

/// Answers every message with the same text. Keeps no history.
#[derive(Debug, Clone)]
pub struct FixedReply {
    text: String,
}

impl FixedReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl ReplyStrategy for FixedReply {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn reply(&self, _sender_id: &str, _text: &str) -> Result<String> {
        Ok(self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_reply_ignores_input() {
        let strategy = FixedReply::new("Yooo man");
        assert_eq!(strategy.reply("1555", "anything").await.unwrap(), "Yooo man");
        assert_eq!(strategy.reply("1666", "else").await.unwrap(), "Yooo man");
        assert_eq!(strategy.name(), "fixed");
    }
}
