//! OpenAI-compatible chat completions client
//!
//! Works against any endpoint that speaks `/chat/completions`: OpenRouter,
//! OpenAI, and Ollama's OpenAI shim.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use super::{
    ApiKey, CompletionClient, CompletionError, CompletionRequest, CompletionResult, endpoint,
    error_from_response, http_client,
};

/// OpenRouter, the default provider.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion APIs.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: ApiKey, timeout: Duration) -> CompletionResult<Self> {
        Ok(Self::with_client(http_client(timeout)?, base_url, api_key))
    }

    /// Creates a client with a custom HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> CompletionResult<String> {
        let api_key = self.api_key.resolve()?;

        let body = json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let mut builder = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(key) = api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let text = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::Parse(format!("Invalid chat completion envelope: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Parse("Response contained no message content".to_string()))
    }
}
