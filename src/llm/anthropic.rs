//! Anthropic Messages API client
//!
//! Implements [`LlmProvider`] over the Messages API with tool use, with
//! retry and exponential backoff on rate limits and timeouts.

use crate::config::LlmSettings;
use crate::error::{AnamnesisError, Result};
use crate::llm::{Completion, CompletionRequest, ContentBlock, LlmProvider, Message, ToolSpec};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Maximum retry attempts for rate limiting
const MAX_RETRIES: usize = 3;

/// Backoff base duration in milliseconds
const BACKOFF_BASE_MS: u64 = 1000;

/// Request timeout duration
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Client configuration
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub base_url: String,
}

impl LlmClientConfig {
    /// Build from settings plus the API key (which only ever comes from the
    /// environment)
    pub fn from_settings(settings: &LlmSettings, api_key: String) -> Self {
        Self {
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            base_url: settings.base_url.clone(),
        }
    }
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: Client,
    config: LlmClientConfig,
}

/// Messages API request format
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec>,
}

/// Messages API response format
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl AnthropicClient {
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AnamnesisError::Authentication(
                "ANTHROPIC_API_KEY not set".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AnamnesisError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Call the API with retry on retryable failures
    async fn call_api_with_retry(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let mut retries = 0;

        loop {
            match self.call_api(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if retries >= MAX_RETRIES {
                        return Err(e);
                    }

                    let should_retry = match &e {
                        AnamnesisError::RateLimited(_) => true,
                        AnamnesisError::Network(msg) if msg.contains("timeout") => true,
                        _ => false,
                    };

                    if !should_retry {
                        return Err(e);
                    }

                    let backoff_ms = BACKOFF_BASE_MS * 2_u64.pow(retries as u32);
                    warn!(
                        "LLM API call failed, retrying after {}ms (attempt {}/{})",
                        backoff_ms,
                        retries + 1,
                        MAX_RETRIES
                    );

                    sleep(Duration::from_millis(backoff_ms)).await;
                    retries += 1;
                }
            }
        }
    }

    /// Call the API once (no retry)
    async fn call_api(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        debug!(
            "Calling Messages API: model={}, {} messages, {} tools",
            request.model,
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnamnesisError::Network(format!("timeout: {}", e))
                } else {
                    AnamnesisError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        match status {
            StatusCode::OK => {
                let body: MessagesResponse = response
                    .json()
                    .await
                    .map_err(|e| AnamnesisError::LlmApi(format!("Invalid response: {}", e)))?;

                debug!(
                    "Messages API returned {} blocks (stop_reason: {:?})",
                    body.content.len(),
                    body.stop_reason
                );

                Ok(body)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                AnamnesisError::Authentication("Invalid or missing API key".to_string()),
            ),
            StatusCode::TOO_MANY_REQUESTS => Err(AnamnesisError::RateLimited(
                "Provider rate limit exceeded".to_string(),
            )),
            _ => {
                let error_msg = match response.json::<ApiErrorResponse>().await {
                    Ok(body) => body
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "Unknown error".to_string()),
                    Err(_) => "Unknown error".to_string(),
                };

                Err(AnamnesisError::LlmApi(format!(
                    "API error (status {}): {}",
                    status, error_msg
                )))
            }
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let api_request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: request.system,
            messages: request.messages,
            tools: request.tools,
        };

        let response = self.call_api_with_retry(&api_request).await?;

        Ok(Completion {
            content: response.content,
            stop_reason: response.stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LlmClientConfig {
        LlmClientConfig {
            api_key: "test-key".to_string(),
            model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            base_url: "https://api.anthropic.com/v1".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        assert!(AnthropicClient::new(test_config()).is_ok());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let mut config = test_config();
        config.api_key = String::new();

        let result = AnthropicClient::new(config);
        assert!(matches!(
            result,
            Err(AnamnesisError::Authentication(_))
        ));
    }

    #[test]
    fn test_request_serialization_skips_empty_tools() {
        let request = MessagesRequest {
            model: "m".to_string(),
            max_tokens: 10,
            temperature: 0.0,
            system: "s".to_string(),
            messages: vec![Message::user_text("hi")],
            tools: vec![],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
    }

    // Integration test (requires API key)
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_complete_round_trip() {
        let api_key = std::env::var("ANTHROPIC_API_KEY").expect("ANTHROPIC_API_KEY not set");
        let mut config = test_config();
        config.api_key = api_key;

        let client = AnthropicClient::new(config).unwrap();
        let completion = client
            .complete(CompletionRequest {
                system: "You are terse.".to_string(),
                messages: vec![Message::user_text("Say OK.")],
                tools: vec![],
            })
            .await
            .unwrap();

        assert!(!completion.text().is_empty());
    }
}
