//! Commonly used types for convenient import.
//!
//! ```
//! use chorus_core::prelude::*;
//! ```

pub use crate::error::{ChorusError, ChorusResult};
pub use crate::ids::{FileId, MessageId, PendingIdSequence, SessionId, UserId};
pub use crate::model::{Message, Role, Session, TempFile, TempFileStatus};
