//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Single blocking completion per request, bounded by `max_tokens`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_core::completion::{CompletionClient, CompletionRequest};
use parley_core::error::ProviderError;
use parley_core::message::MessageRole;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic Messages API client.
pub struct AnthropicClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// Create a new client. Fails if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create with a custom base URL (testing, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn to_api_messages(request: &CompletionRequest) -> Vec<ApiMessage> {
        request
            .turns
            .iter()
            .map(|turn| ApiMessage {
                role: match turn.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: turn.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = ApiRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: Self::to_api_messages(&request),
        };

        debug!(model = %request.model, turns = request.turns.len(), "Anthropic completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::AuthenticationFailed(message),
                429 => ProviderError::RateLimited {
                    retry_after_secs: 30,
                },
                code => ProviderError::Api {
                    status_code: code,
                    message,
                },
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let text = api_response
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
            })
            .ok_or_else(|| ProviderError::Malformed("response had no text block".into()))?;

        Ok(text)
    }
}

// --- Wire types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ApiMessage>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::completion::Turn;

    #[test]
    fn turns_map_to_api_roles() {
        let request = CompletionRequest {
            model: "claude-3-5-sonnet-20241022".into(),
            system: "You are AI Assistant.".into(),
            turns: vec![Turn::user("hi"), Turn::assistant("hello"), Turn::user("ok")],
            max_tokens: 2000,
        };
        let messages = AnthropicClient::to_api_messages(&request);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].content, "ok");
    }

    #[test]
    fn response_parses_text_block() {
        let json = r#"{"content":[{"type":"text","text":"A variable is a name."}]}"#;
        let response: ApiResponse = serde_json::from_str(json).unwrap();
        match &response.content[0] {
            ContentBlock::Text { text } => assert_eq!(text, "A variable is a name."),
        }
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = AnthropicClient::new("key", std::time::Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:9999/");
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
