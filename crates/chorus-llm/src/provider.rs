//! Provider capability traits: [`ChatModel`], [`TitleModel`], [`ProviderFactory`].
//!
//! Modelled as small capability interfaces rather than an inheritance
//! hierarchy (spec §9, "Dynamic-dispatch provider clients"); the factory
//! chooses the concrete implementation by provider name.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::LlmResult;
use crate::types::{Message, StreamEvent};

/// Type alias for a boxed stream of incremental completion events.
pub type StreamBox = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// The conversational model used for a session's turns.
///
/// Implementors realise streaming as channels, async iterators, or
/// callback pumps as long as cancellation and backpressure are honoured
/// (spec §9): the executor only calls the caller's `ChunkFn` after
/// receiving a batch, so a slow caller throttles the provider by simply
/// not polling the stream further.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider name, e.g. `"claude"`, `"openai"`.
    fn provider(&self) -> &str;

    /// Model name, e.g. `"claude-sonnet-4-20250514"`.
    fn model(&self) -> &str;

    /// Stream a completion given the full session history so far.
    async fn stream(&self, messages: &[Message]) -> LlmResult<StreamBox>;
}

/// The lightweight model used for session-title generation and file
/// summarisation — usually a cheaper/faster model than the chat model.
#[async_trait]
pub trait TitleModel: Send + Sync {
    /// Generate a short session title from the opening message(s).
    async fn generate(&self, messages: &[Message]) -> LlmResult<String>;

    /// Summarise a file's (possibly trimmed) content for inclusion in history.
    async fn summarize_file(&self, messages: &[Message]) -> LlmResult<String>;
}

/// Builds a matched pair of `(ChatModel, TitleModel)` for a
/// `(provider, model, token)` triple (spec §4.6.3 / §6).
///
/// A session's [`chorus_runtime::SessionResources`][res] are rebuilt
/// through this factory whenever that triple changes.
///
/// [res]: ../chorus_runtime/struct.SessionResources.html
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Construct clients for the given provider/model/token.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LlmError::UnknownProvider`] for an unrecognised
    /// provider name, or [`crate::LlmError::TokenNotConfigured`] /
    /// [`crate::LlmError::ConfigError`] for credential problems.
    async fn build(
        &self,
        provider: &str,
        model: &str,
        token: &str,
    ) -> LlmResult<(Arc<dyn ChatModel>, Arc<dyn TitleModel>)>;
}
