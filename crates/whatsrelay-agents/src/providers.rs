use async_trait::async_trait;
use whatsrelay_common::{Result, Turn};

/// Trait for text-completion backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g. "openai").
    fn provider_id(&self) -> &str;

    /// Send a completion request and return the response.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Check if the provider is reachable and the credential is accepted.
    async fn health_check(&self) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    /// Role-tagged messages in submission order, system instruction first.
    pub messages: Vec<Turn>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
