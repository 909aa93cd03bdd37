//! Runtime configuration: the `DispatcherConfig` knobs plus the handful
//! of additional scalars the runtime itself needs (spec §6, "CLI /
//! runtime surface").

use std::path::PathBuf;
use std::time::Duration;

use chorus_dispatch::DispatcherConfig;

/// Per-turn deadline past which a Stream call is cancelled (spec §5,
/// "Each streaming turn is additionally bounded by a per-request
/// deadline (default 2 min)").
const DEFAULT_STREAM_DEADLINE: Duration = Duration::from_secs(120);

/// Configuration for a [`crate::manager::Manager`] and the `Dispatcher`
/// it owns.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Worker pool / intake queue configuration.
    pub dispatcher: DispatcherConfig,
    /// Enables verbose scheduler logging (spec §6, "a flag to enable
    /// verbose scheduler logging").
    pub verbose: bool,
    /// Base directory `FileLoader` resolves attachment paths against.
    pub file_base_dir: PathBuf,
    /// Deadline for a single streaming turn, from enqueue to `done`.
    pub stream_deadline: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            verbose: false,
            file_base_dir: PathBuf::from("."),
            stream_deadline: DEFAULT_STREAM_DEADLINE,
        }
    }
}

impl RuntimeConfig {
    /// Layer `CHORUS_VERBOSE` (and, through [`DispatcherConfig::from_env`],
    /// the dispatcher's own env knobs) over the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            dispatcher: DispatcherConfig::from_env(),
            verbose: std::env::var("CHORUS_VERBOSE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            ..Self::default()
        }
    }

    /// Set the attachment base directory.
    #[must_use]
    pub fn with_file_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_base_dir = dir.into();
        self
    }
}
