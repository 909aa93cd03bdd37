//! Claude (Anthropic) provider implementation.

use async_stream::try_stream;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{LlmError, LlmResult};
use crate::provider::{ChatModel, StreamBox, TitleModel};
use crate::types::{Message, MessageRole, StreamEvent};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: usize = 4096;
const TITLE_MAX_TOKENS: usize = 64;

/// Shared request/response plumbing for the Claude chat and title clients.
struct ClaudeClient {
    http: Client,
    token: String,
    model: String,
    base_url: Option<String>,
}

impl ClaudeClient {
    fn new(token: String, model: String) -> Self {
        Self {
            http: Client::new(),
            token,
            model,
            base_url: None,
        }
    }

    fn url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL)
    }

    fn auth_header(&self) -> LlmResult<reqwest::header::HeaderValue> {
        let mut value = reqwest::header::HeaderValue::try_from(&self.token)
            .map_err(|e| LlmError::ConfigError(format!("invalid token characters: {e}")))?;
        value.set_sensitive(true);
        Ok(value)
    }

    fn build_request(&self, messages: &[Message], max_tokens: usize, stream: bool) -> Value {
        let mut system = String::new();
        let api_messages: Vec<Value> = messages
            .iter()
            .filter_map(|m| match m.role {
                MessageRole::System => {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(&m.content);
                    None
                },
                MessageRole::User | MessageRole::Assistant => Some(serde_json::json!({
                    "role": match m.role {
                        MessageRole::Assistant => "assistant",
                        _ => "user",
                    },
                    "content": m.content,
                })),
            })
            .collect();

        let mut request = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": api_messages,
            "stream": stream,
        });
        if !system.is_empty() {
            request["system"] = Value::String(system);
        }
        request
    }

    async fn send_non_streaming(&self, body: Value) -> LlmResult<String> {
        let response = self
            .http
            .post(self.url())
            .header("x-api-key", self.auth_header()?)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "claude API error");
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimitExceeded {
                    retry_after_secs: 60,
                });
            }
            return Err(LlmError::ApiRequestFailed(format!("{status}: {text}")));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let text = parsed
            .content
            .into_iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text),
            })
            .collect::<Vec<_>>()
            .join("");
        Ok(text)
    }
}

/// Claude chat model, used for the full conversation turn.
pub struct ClaudeChatModel {
    client: ClaudeClient,
    max_tokens: usize,
}

impl ClaudeChatModel {
    /// Create a new Claude chat model client.
    #[must_use]
    pub fn new(token: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: ClaudeClient::new(token.into(), model.into()),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Override the API base URL (tests, self-hosted proxies).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.client.base_url = Some(url.into());
        self
    }
}

#[async_trait]
impl ChatModel for ClaudeChatModel {
    fn provider(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.client.model
    }

    async fn stream(&self, messages: &[Message]) -> LlmResult<StreamBox> {
        if self.client.token.is_empty() {
            return Err(LlmError::TokenNotConfigured {
                provider: "claude".to_string(),
            });
        }

        let body = self.client.build_request(messages, self.max_tokens, true);
        debug!(model = %self.client.model, "starting claude stream");

        let response = self
            .client
            .http
            .post(self.client.url())
            .header("x-api-key", self.client.auth_header()?)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "claude API error");
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimitExceeded {
                    retry_after_secs: 60,
                });
            }
            return Err(LlmError::ApiRequestFailed(format!("{status}: {text}")));
        }

        let stream = try_stream! {
            use futures::StreamExt;
            let mut bytes_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes_stream.next().await {
                let chunk = chunk?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(event_end) = buffer.find("\n\n") {
                    let event_data = buffer[..event_end].to_string();
                    #[allow(clippy::arithmetic_side_effects)]
                    let rest_start = event_end + 2;
                    buffer = buffer[rest_start..].to_string();

                    for line in event_data.lines() {
                        let Some(data) = line.strip_prefix("data: ") else { continue };
                        if data == "[DONE]" {
                            yield StreamEvent::Done;
                            continue;
                        }
                        let Ok(event) = serde_json::from_str::<StreamingEvent>(data) else { continue };
                        match event {
                            StreamingEvent::ContentBlockDelta { delta: Delta::TextDelta { text }, .. } => {
                                yield StreamEvent::TextDelta(text);
                            }
                            StreamingEvent::MessageDelta { usage: Some(usage), .. } => {
                                yield StreamEvent::Usage { input_tokens: 0, output_tokens: usage.output_tokens };
                            }
                            StreamingEvent::MessageStop => {
                                yield StreamEvent::Done;
                            }
                            _ => {}
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Claude title/summary model, used for the cheap auxiliary calls.
pub struct ClaudeTitleModel {
    client: ClaudeClient,
}

impl ClaudeTitleModel {
    /// Create a new Claude title/summary model client.
    #[must_use]
    pub fn new(token: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: ClaudeClient::new(token.into(), model.into()),
        }
    }

    /// Override the API base URL (tests, self-hosted proxies).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.client.base_url = Some(url.into());
        self
    }
}

#[async_trait]
impl TitleModel for ClaudeTitleModel {
    async fn generate(&self, messages: &[Message]) -> LlmResult<String> {
        if self.client.token.is_empty() {
            return Err(LlmError::TokenNotConfigured {
                provider: "claude".to_string(),
            });
        }
        let mut prompted = vec![Message::system(
            "Summarise the user's opening message as a short conversation title (max 6 words). \
             Reply with the title text only.",
        )];
        prompted.extend_from_slice(messages);
        let body = self.client.build_request(&prompted, TITLE_MAX_TOKENS, false);
        let text = self.client.send_non_streaming(body).await?;
        Ok(text.trim().to_string())
    }

    async fn summarize_file(&self, messages: &[Message]) -> LlmResult<String> {
        if self.client.token.is_empty() {
            return Err(LlmError::TokenNotConfigured {
                provider: "claude".to_string(),
            });
        }
        let mut prompted = vec![Message::system(
            "Summarise the following file content in 2-3 sentences for use as conversation context.",
        )];
        prompted.extend_from_slice(messages);
        let body = self.client.build_request(&prompted, DEFAULT_MAX_TOKENS, false);
        let text = self.client.send_non_streaming(body).await?;
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(dead_code)] // variants required for deserialization completeness
enum StreamingEvent {
    MessageStart {
        message: Value,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: Delta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: Value,
        usage: Option<DeltaUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: Value,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
}

#[derive(Debug, Deserialize)]
struct DeltaUsage {
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_folds_system_messages() {
        let client = ClaudeClient::new("key".into(), "claude-3-sonnet".into());
        let messages = vec![Message::system("be terse"), Message::user("hi")];
        let body = client.build_request(&messages, 100, false);
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_http_call() {
        let model = ClaudeChatModel::new("", "claude-3-sonnet");
        let err = model.stream(&[]).await.unwrap_err();
        assert!(matches!(err, LlmError::TokenNotConfigured { .. }));

        let title = ClaudeTitleModel::new("", "claude-3-sonnet");
        let err = title.generate(&[]).await.unwrap_err();
        assert!(matches!(err, LlmError::TokenNotConfigured { .. }));
    }
}
