//! Convenient re-exports for consumers of this crate.
//!
//! ```
//! use chorus_llm::prelude::*;
//! ```

pub use crate::claude::{ClaudeChatModel, ClaudeTitleModel};
pub use crate::error::{LlmError, LlmResult};
pub use crate::openai_compat::{OpenAiCompatChatModel, OpenAiCompatTitleModel};
pub use crate::provider::{ChatModel, ProviderFactory, StreamBox, TitleModel};
pub use crate::types::{Message, MessageRole, StreamEvent, Usage};
