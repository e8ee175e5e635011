use std::time::Duration;

use crate::providers::{LlmProvider, LlmRequest, LlmResponse, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use whatsrelay_common::{Error, Result, Role, Turn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat Completions client for OpenAI and API-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self::with_client(Client::new(), api_key, base_url)
    }

    /// Build a provider whose HTTP calls are bounded by `timeout`.
    pub fn with_timeout(
        api_key: String,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build OpenAI HTTP client: {e}")))?;
        Ok(Self::with_client(client, api_key, base_url))
    }

    fn with_client(client: Client, api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            client,
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let openai_request = convert_request(request);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| Error::Completion(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Completion(format!(
                "OpenAI API error ({status}): {error_text}"
            )));
        }

        let openai_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| Error::Completion(format!("failed to parse OpenAI response: {e}")))?;

        convert_response(openai_response)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);
        let response = self.client.get(&url).bearer_auth(&self.api_key).send().await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

fn convert_request(request: &LlmRequest) -> OpenAiRequest<'_> {
    OpenAiRequest {
        model: &request.model,
        messages: request.messages.iter().map(convert_message).collect(),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

fn convert_message(turn: &Turn) -> OpenAiMessage<'_> {
    let role = match turn.role() {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    OpenAiMessage {
        role,
        content: turn.content(),
    }
}

fn convert_response(response: OpenAiResponse) -> Result<LlmResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Completion("no choices in OpenAI response".to_string()))?;

    let text = choice
        .message
        .content
        .ok_or_else(|| Error::Completion("OpenAI response has no message content".to_string()))?;

    Ok(LlmResponse {
        text,
        model: response.model,
        usage: response.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
        stop_reason: choice.finish_reason,
    })
}

// Request Types
#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// Response Types
#[derive(Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_roles_in_order() {
        let request = LlmRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                Turn::system("Answer briefly."),
                Turn::user("Hi"),
                Turn::assistant("Hello"),
                Turn::user("How are you?"),
            ],
            max_tokens: Some(5),
            temperature: Some(0.2),
        };

        let body = serde_json::to_value(convert_request(&request)).unwrap();
        let roles: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(body["messages"][3]["content"], "How are you?");
        assert_eq!(body["max_tokens"], 5);
        assert_eq!(body["model"], "gpt-4o-mini");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let request = LlmRequest {
            model: "m".to_string(),
            messages: vec![Turn::user("Hi")],
            max_tokens: None,
            temperature: None,
        };
        let body = serde_json::to_value(convert_request(&request)).unwrap();
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn empty_choices_is_an_error() {
        let response = OpenAiResponse {
            model: "m".to_string(),
            choices: vec![],
            usage: None,
        };
        let err = convert_response(response).unwrap_err();
        assert!(matches!(err, Error::Completion(_)));
    }
}
