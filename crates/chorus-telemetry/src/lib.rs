//! Logging setup shared by the chorus binary and library crates.
//!
//! This crate provides a small, configurable `tracing` subscriber
//! installer so every crate in the workspace emits events through the
//! same formatting and filtering rules instead of each reaching for its
//! own `tracing_subscriber::fmt::init()`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{setup_default_logging, setup_logging, LogConfig, LogFormat, LogTarget};
