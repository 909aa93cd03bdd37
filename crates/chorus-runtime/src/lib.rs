//! Per-user session state, the streaming task executor, and the
//! [`Manager`] orchestrator (spec §4–§6).
//!
//! This crate sits between a stateless HTTP layer and the
//! `chorus-dispatch`/`chorus-llm`/`chorus-cache` crates: it holds the
//! one piece of server-side mutable state the system carries — each
//! user's in-memory session cache — and implements the `Init`/`Stream`
//! algorithms that read and write it. The dispatcher below knows
//! nothing about sessions; everything conversation-specific is built
//! here as jobs that close over a cloned [`Manager`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod file_loader;
pub mod manager;
pub mod persistence;
pub mod prelude;
pub mod protocol;
pub mod user_state;

pub use config::RuntimeConfig;
pub use file_loader::{FileLoader, LocalFileLoader};
pub use manager::{InitRequest, Manager, StreamRequest};
pub use persistence::{InMemoryPersistence, NewMessage, NewTempFile, Persistence};
pub use protocol::{ChunkFn, StreamEvent};
pub use user_state::{ResourceKey, SessionResources, UserState};
