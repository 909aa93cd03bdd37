//! Convenient re-exports for consumers of this crate.

pub use crate::dispatcher::{Dispatcher, DispatcherConfig};
pub use crate::job::Job;
pub use crate::pool::{Pool, PoolConfig};
