//! Wire-neutral message and streaming types shared by every provider.

use serde::{Deserialize, Serialize};

/// A message as sent to a provider's completion/stream endpoint.
///
/// Distinct from [`chorus_core::Message`][core-message]: this is the
/// transient, provider-facing shape (role + text); the core type adds
/// persisted identity and timestamps.
///
/// [core-message]: ../chorus_core/struct.Message.html
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions, file summaries).
    System,
    /// User message.
    User,
    /// Assistant message.
    Assistant,
}

/// An incremental event from a streaming completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Partial text output — the executor appends these to build the
    /// cumulative text it hands to `ChunkFn`.
    TextDelta(String),
    /// Token usage, reported once at the end of a stream by most providers.
    Usage {
        /// Input tokens billed for this turn.
        input_tokens: usize,
        /// Output tokens billed for this turn.
        output_tokens: usize,
    },
    /// Stream completed normally.
    Done,
    /// The provider reported an in-stream error.
    Error(String),
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens.
    pub input_tokens: usize,
    /// Output tokens.
    pub output_tokens: usize,
}

impl Usage {
    /// Total tokens.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_set_role() {
        assert_eq!(Message::user("hi").role, MessageRole::User);
        assert_eq!(Message::assistant("hi").role, MessageRole::Assistant);
        assert_eq!(Message::system("hi").role, MessageRole::System);
    }

    #[test]
    fn usage_total_sums_both_fields() {
        let u = Usage {
            input_tokens: 10,
            output_tokens: 5,
        };
        assert_eq!(u.total(), 15);
    }
}
