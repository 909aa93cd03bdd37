//! Test doubles for exercising the dispatcher and runtime without a network.
//!
//! Mirrors the in-memory test-double convention used elsewhere in this
//! workspace: a fully in-process stand-in that implements the same
//! traits real providers do, driven by a canned script instead of HTTP.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;

use crate::error::{LlmError, LlmResult};
use crate::provider::{ChatModel, ProviderFactory, StreamBox, TitleModel};
use crate::types::{Message, StreamEvent};

/// A [`ChatModel`] that replays a fixed sequence of [`StreamEvent`]s.
///
/// Each call to [`ChatModel::stream`] replays the same script; use
/// [`ScriptedChatModel::with_failure`] to make the first call fail instead.
pub struct ScriptedChatModel {
    events: Vec<StreamEvent>,
    fail_first: bool,
    calls: AtomicUsize,
}

impl ScriptedChatModel {
    /// Build a model that yields the given text as a single delta, then `Done`.
    #[must_use]
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            events: vec![StreamEvent::TextDelta(text.into()), StreamEvent::Done],
            fail_first: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Build a model from an explicit event script.
    #[must_use]
    pub fn scripted(events: Vec<StreamEvent>) -> Self {
        Self {
            events,
            fail_first: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Make the first `stream()` call return an error instead of replaying.
    #[must_use]
    pub fn with_failure(mut self) -> Self {
        self.fail_first = true;
        self
    }

    /// Number of times `stream()` has been called so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn stream(&self, _messages: &[Message]) -> LlmResult<StreamBox> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_first && call_index == 0 {
            return Err(LlmError::ApiRequestFailed("scripted failure".to_string()));
        }
        let events: Vec<LlmResult<StreamEvent>> =
            self.events.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(events)))
    }
}

/// A [`TitleModel`] that returns a fixed title and summary.
pub struct ScriptedTitleModel {
    title: String,
    summary: String,
    calls: AtomicUsize,
}

impl ScriptedTitleModel {
    /// Build a title model that always returns the given title and summary.
    #[must_use]
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `generate`/`summarize_file` calls observed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TitleModel for ScriptedTitleModel {
    async fn generate(&self, _messages: &[Message]) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.title.clone())
    }

    async fn summarize_file(&self, _messages: &[Message]) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.summary.clone())
    }
}

/// A [`ProviderFactory`] that always hands back the same scripted pair,
/// regardless of the requested provider/model/token.
pub struct ScriptedProviderFactory {
    chat: Arc<dyn ChatModel>,
    title: Arc<dyn TitleModel>,
}

impl ScriptedProviderFactory {
    /// Build a factory that always returns the given chat and title models.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatModel>, title: Arc<dyn TitleModel>) -> Self {
        Self { chat, title }
    }

    /// Convenience constructor wiring a fixed reply and title/summary.
    #[must_use]
    pub fn replying(reply: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            chat: Arc::new(ScriptedChatModel::replying(reply)),
            title: Arc::new(ScriptedTitleModel::new(title, "a summarised file")),
        }
    }
}

#[async_trait]
impl ProviderFactory for ScriptedProviderFactory {
    async fn build(
        &self,
        _provider: &str,
        _model: &str,
        _token: &str,
    ) -> LlmResult<(Arc<dyn ChatModel>, Arc<dyn TitleModel>)> {
        Ok((self.chat.clone(), self.title.clone()))
    }
}
