//! Convenient re-exports for consumers of this crate.
//!
//! ```
//! use chorus_telemetry::prelude::*;
//! ```

pub use crate::{setup_default_logging, setup_logging, LogConfig, LogFormat, LogTarget, TelemetryError};
