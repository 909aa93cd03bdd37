//! OpenAI-compatible provider implementation.
//!
//! Works with the `OpenAI` API and any endpoint speaking the same
//! `/v1/chat/completions` wire format (Gemini's OpenAI-compatibility
//! layer included — the spec lists `openai`, `gemini`, and `claude` as
//! the provider names the factory must recognise).

use async_stream::try_stream;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{LlmError, LlmResult};
use crate::provider::{ChatModel, StreamBox, TitleModel};
use crate::types::{Message, MessageRole, StreamEvent};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MAX_TOKENS: usize = 4096;
const TITLE_MAX_TOKENS: usize = 32;

struct OpenAiCompatClient {
    http: Client,
    model: String,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatClient {
    fn new(provider_name: &'static str, model: String, api_key: Option<String>) -> Self {
        let base_url = match provider_name {
            "gemini" => {
                "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
                    .to_string()
            },
            _ => DEFAULT_OPENAI_URL.to_string(),
        };
        Self {
            http: Client::new(),
            model,
            base_url,
            api_key,
        }
    }

    fn build_request(&self, messages: &[Message], max_tokens: usize, stream: bool) -> Value {
        let api_messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        MessageRole::System => "system",
                        MessageRole::User => "user",
                        MessageRole::Assistant => "assistant",
                    },
                    "content": m.content,
                })
            })
            .collect();

        serde_json::json!({
            "model": self.model,
            "messages": api_messages,
            "max_tokens": max_tokens,
            "stream": stream,
        })
    }

    fn request(&self, body: &Value) -> reqwest::RequestBuilder {
        let mut req = self.http.post(&self.base_url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn send_non_streaming(&self, body: Value) -> LlmResult<String> {
        let response = self.request(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "openai-compatible API error");
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimitExceeded {
                    retry_after_secs: 60,
                });
            }
            return Err(LlmError::ApiRequestFailed(format!("{status}: {text}")));
        }
        let parsed: ChatCompletion = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}

/// OpenAI-compatible chat model.
pub struct OpenAiCompatChatModel {
    client: OpenAiCompatClient,
    provider_name: &'static str,
    max_tokens: usize,
}

impl OpenAiCompatChatModel {
    /// Create a chat model for the `OpenAI` API.
    #[must_use]
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OpenAiCompatClient::new("openai", model.into(), Some(api_key.into())),
            provider_name: "openai",
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create a chat model for Gemini's `OpenAI`-compatibility endpoint.
    #[must_use]
    pub fn gemini(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OpenAiCompatClient::new("gemini", model.into(), Some(api_key.into())),
            provider_name: "gemini",
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatChatModel {
    fn provider(&self) -> &str {
        self.provider_name
    }

    fn model(&self) -> &str {
        &self.client.model
    }

    async fn stream(&self, messages: &[Message]) -> LlmResult<StreamBox> {
        if self.client.api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(LlmError::TokenNotConfigured {
                provider: self.provider_name.to_string(),
            });
        }

        let body = self.client.build_request(messages, self.max_tokens, true);
        debug!(provider = self.provider_name, model = %self.client.model, "starting openai-compatible stream");

        let response = self.client.request(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "openai-compatible API error");
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

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    #[allow(clippy::arithmetic_side_effects)]
                    let rest_start = line_end + 1;
                    buffer = buffer[rest_start..].to_string();

                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    if data == "[DONE]" {
                        yield StreamEvent::Done;
                        continue;
                    }
                    let Ok(chunk) = serde_json::from_str::<ChatCompletionChunk>(data) else { continue };
                    if let Some(choice) = chunk.choices.into_iter().next() {
                        if let Some(content) = choice.delta.content {
                            yield StreamEvent::TextDelta(content);
                        }
                        if choice.finish_reason.is_some() {
                            yield StreamEvent::Done;
                        }
                    }
                    if let Some(usage) = chunk.usage {
                        yield StreamEvent::Usage {
                            input_tokens: usage.prompt_tokens,
                            output_tokens: usage.completion_tokens,
                        };
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// OpenAI-compatible title/summary model.
pub struct OpenAiCompatTitleModel {
    client: OpenAiCompatClient,
    provider_name: &'static str,
}

impl OpenAiCompatTitleModel {
    /// Create a title model for the `OpenAI` API.
    #[must_use]
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OpenAiCompatClient::new("openai", model.into(), Some(api_key.into())),
            provider_name: "openai",
        }
    }

    /// Create a title model for Gemini's `OpenAI`-compatibility endpoint.
    #[must_use]
    pub fn gemini(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OpenAiCompatClient::new("gemini", model.into(), Some(api_key.into())),
            provider_name: "gemini",
        }
    }
}

#[async_trait]
impl TitleModel for OpenAiCompatTitleModel {
    async fn generate(&self, messages: &[Message]) -> LlmResult<String> {
        if self.client.api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(LlmError::TokenNotConfigured {
                provider: self.provider_name.to_string(),
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
        if self.client.api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(LlmError::TokenNotConfigured {
                provider: self.provider_name.to_string(),
            });
        }
        let mut prompted = vec![Message::system(
            "Summarise the following file content in 2-3 sentences for use as conversation context.",
        )];
        prompted.extend_from_slice(messages);
        let body = self
            .client
            .build_request(&prompted, DEFAULT_MAX_TOKENS, false);
        let text = self.client.send_non_streaming(body).await?;
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChatCompletionChunkChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunkChoice {
    delta: ChatCompletionDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_uses_compat_endpoint() {
        let client = OpenAiCompatClient::new("gemini", "gemini-2.0-flash".into(), Some("k".into()));
        assert!(client.base_url.contains("generativelanguage.googleapis.com"));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_http_call() {
        let model = OpenAiCompatChatModel {
            client: OpenAiCompatClient::new("openai", "gpt-4o".into(), None),
            provider_name: "openai",
            max_tokens: DEFAULT_MAX_TOKENS,
        };
        let err = model.stream(&[]).await.unwrap_err();
        assert!(matches!(err, LlmError::TokenNotConfigured { .. }));
    }
}
