use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use whatsrelay_common::{Error, Result, Turn};

use crate::providers::{LlmProvider, LlmRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Stateless wrapper around one completion call per invocation.
///
/// Every failure (transport, API status, malformed body, timeout) surfaces as
/// [`Error::Completion`]. Nothing is retried here.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Output-token cap. Without it the word limit passed to
    /// [`complete`](Self::complete) doubles as the token cap.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn complete(&self, messages: &[Turn], max_words: u32) -> Result<String> {
        let request = LlmRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            max_tokens: Some(self.max_tokens.unwrap_or(max_words)),
            temperature: self.temperature,
        };

        let response = tokio::time::timeout(self.timeout, self.provider.complete(&request))
            .await
            .map_err(|_| {
                warn!(
                    "completion via '{}' timed out after {:?}",
                    self.provider.provider_id(),
                    self.timeout
                );
                Error::Completion(format!("timed out after {:?}", self.timeout))
            })?
            .map_err(|e| match e {
                Error::Completion(_) => e,
                other => Error::Completion(other.to_string()),
            })?;

        let text = response.text.trim();
        if text.is_empty() {
            return Err(Error::Completion("completion returned empty text".into()));
        }

        if let Some(usage) = &response.usage {
            info!(
                model = %response.model,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "completion finished"
            );
        }

        Ok(text.to_string())
    }
}
