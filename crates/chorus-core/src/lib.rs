//! Chorus Core — shared identifiers, error taxonomy, and data model for
//! the per-user streaming conversation dispatcher.
//!
//! This crate provides:
//! - Identifiers with pending/real session-id promotion semantics
//! - The persisted data model (`Session`, `Message`, `TempFile`)
//! - The unified `ChorusError` taxonomy

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod model;
pub mod prelude;

pub use error::{ChorusError, ChorusResult};
pub use ids::{FileId, MessageId, PendingIdSequence, SessionId, UserId};
pub use model::{Message, Role, Session, TempFile, TempFileStatus};
