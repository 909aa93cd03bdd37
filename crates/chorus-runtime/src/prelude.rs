//! Convenient re-exports for consumers of this crate.
//!
//! ```
//! use chorus_runtime::prelude::*;
//! ```

pub use crate::config::RuntimeConfig;
pub use crate::file_loader::{FileLoader, LocalFileLoader};
pub use crate::manager::{InitRequest, Manager, StreamRequest};
pub use crate::persistence::{InMemoryPersistence, NewMessage, NewTempFile, Persistence};
pub use crate::protocol::{ChunkFn, StreamEvent};
pub use crate::user_state::{ResourceKey, SessionResources, UserState};
