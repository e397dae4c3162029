//! Anthropic Messages API client (non-streaming)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;

use super::{
    ApiKey, CompletionClient, CompletionError, CompletionRequest, CompletionResult, endpoint,
    error_from_response, http_client,
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header.
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl AnthropicClient {
    pub fn new(base_url: impl Into<String>, api_key: ApiKey, timeout: Duration) -> CompletionResult<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> CompletionResult<String> {
        let api_key = self
            .api_key
            .resolve()?
            .ok_or_else(|| CompletionError::InvalidConfig("Anthropic requires an API key".to_string()))?;

        let body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{ "role": "user", "content": request.prompt }],
        });

        let response = self
            .client
            .post(endpoint(&self.base_url, "messages"))
            .header(CONTENT_TYPE, "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let text = response.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::Parse(format!("Invalid messages envelope: {e}")))?;

        let joined: String = parsed
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect();

        if joined.is_empty() {
            return Err(CompletionError::Parse(
                "Response contained no text content".to_string(),
            ));
        }
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryClassifiable;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "Analyze this".to_string(),
            model: "claude-haiku".to_string(),
            temperature: 0.3,
            max_tokens: 400,
        }
    }

    #[tokio::test]
    async fn joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-ant"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    { "type": "text", "text": "{\"evaluation\":" },
                    { "type": "text", "text": "\"GOOD\"}" }
                ]
            })))
            .mount(&server)
            .await;

        let client =
            AnthropicClient::new(server.uri(), ApiKey::literal("sk-ant"), Duration::from_secs(5)).unwrap();
        let text = client.complete(&request()).await.unwrap();
        assert_eq!(text, "{\"evaluation\":\"GOOD\"}");
    }

    #[tokio::test]
    async fn overloaded_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(json!({
                "type": "error",
                "error": { "type": "overloaded_error", "message": "Overloaded" }
            })))
            .mount(&server)
            .await;

        let client =
            AnthropicClient::new(server.uri(), ApiKey::literal("sk-ant"), Duration::from_secs(5)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Overloaded"));
    }

    #[tokio::test]
    async fn bad_request_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "type": "error",
                "error": { "type": "invalid_request_error", "message": "max_tokens too large" }
            })))
            .mount(&server)
            .await;

        let client =
            AnthropicClient::new(server.uri(), ApiKey::literal("sk-ant"), Duration::from_secs(5)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
