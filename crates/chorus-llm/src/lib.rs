//! Pluggable streaming LLM provider clients.
//!
//! Every provider implements the narrow [`provider::ChatModel`] and
//! [`provider::TitleModel`] capability traits rather than one monolithic
//! interface: a session's chat turns and its title/file-summary calls are
//! often served by different models (a cheap model for titles, a capable
//! one for chat), and splitting the traits lets a [`provider::ProviderFactory`]
//! mix and match without forcing every provider to implement both.
//!
//! This crate has no dependency on `chorus-core`: [`types::Message`] is a
//! deliberately minimal wire type, distinct from the persisted
//! `chorus_core::Message`. The conversion between them is the runtime
//! layer's job, not this one's.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod claude;
pub mod error;
pub mod openai_compat;
pub mod prelude;
pub mod provider;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testutil;

pub use error::{LlmError, LlmResult};
pub use provider::{ChatModel, ProviderFactory, StreamBox, TitleModel};
pub use types::{Message, MessageRole, StreamEvent, Usage};

use std::sync::Arc;

use async_trait::async_trait;

/// The default [`ProviderFactory`], wiring provider names to the
/// built-in Claude and OpenAI-compatible clients.
///
/// Recognises `"claude"`, `"openai"`, and `"gemini"` (the latter served
/// through the OpenAI-compatibility endpoint). Any other name yields
/// [`LlmError::UnknownProvider`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProviderFactory;

#[async_trait]
impl ProviderFactory for DefaultProviderFactory {
    async fn build(
        &self,
        provider: &str,
        model: &str,
        token: &str,
    ) -> LlmResult<(Arc<dyn ChatModel>, Arc<dyn TitleModel>)> {
        match provider {
            "claude" => Ok((
                Arc::new(claude::ClaudeChatModel::new(token, model)),
                Arc::new(claude::ClaudeTitleModel::new(token, model)),
            )),
            "openai" => Ok((
                Arc::new(openai_compat::OpenAiCompatChatModel::openai(token, model)),
                Arc::new(openai_compat::OpenAiCompatTitleModel::openai(token, model)),
            )),
            "gemini" => Ok((
                Arc::new(openai_compat::OpenAiCompatChatModel::gemini(token, model)),
                Arc::new(openai_compat::OpenAiCompatTitleModel::gemini(token, model)),
            )),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let factory = DefaultProviderFactory;
        let err = factory.build("not-a-provider", "m", "t").await.unwrap_err();
        assert!(matches!(err, LlmError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn recognised_providers_build_clients() {
        let factory = DefaultProviderFactory;
        for provider in ["claude", "openai", "gemini"] {
            let (chat, _title) = factory.build(provider, "m", "t").await.unwrap();
            assert!(!chat.model().is_empty());
        }
    }
}
