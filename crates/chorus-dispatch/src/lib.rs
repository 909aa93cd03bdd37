//! Fair per-user job dispatch over an elastic worker pool.
//!
//! Three components compose here (spec §4.2–§4.4): an elastic
//! [`pool::Pool`] of fungible [`worker`] tasks, and a [`dispatcher::Dispatcher`]
//! that admits jobs into a bounded intake queue and hands them out in
//! round-robin order across users so one chatty user cannot starve
//! another's turn.
//!
//! This crate knows nothing about sessions, messages, or providers —
//! [`job::Job`] wraps an opaque async thunk. The conversation-specific
//! `Init`/`Stream` semantics live in `chorus-runtime`, which builds jobs
//! that close over its own state and reply channels.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatcher;
pub mod job;
pub mod pool;
pub mod prelude;
mod worker;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use job::{Job, JobFn, JobFuture};
pub use pool::{Pool, PoolConfig};
pub use worker::{WorkerHandle, WorkerId};
