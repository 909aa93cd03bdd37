//! Identifiers shared across the dispatcher, runtime, and cache crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// A stable user identifier.
///
/// Opaque to this crate: callers mint it however their auth layer
/// assigns identity (a DB primary key, a hashed token, etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl UserId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A session identifier.
///
/// Positive once persisted. A negative value is a *pending* id —
/// see [`PendingIdSequence`] — that must never cross the external
/// interface (spec §6: "Pending negative ids are internal and must
/// never cross the interface").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

impl SessionId {
    /// Wrap a raw id. `0` means "create a new session" at the wire boundary;
    /// callers should not construct `SessionId(0)` and hold onto it.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Whether this id is a pending (not-yet-persisted) placeholder.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        self.0 < 0
    }

    /// Whether this id is real (persisted, positive).
    #[must_use]
    pub const fn is_real(self) -> bool {
        self.0 > 0
    }

    /// The sentinel meaning "create a new session" on the wire.
    #[must_use]
    pub const fn create_new() -> Self {
        Self(0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically decreasing generator for pending session ids.
///
/// One instance lives for the lifetime of the process (spec §9: "Global
/// state (pending-id sequence...) is initialised once per process").
/// Implementers should use a monotonically decreasing counter for pending
/// ids and promote atomically inside `UserState` — this is exactly that
/// counter.
#[derive(Debug, Default)]
pub struct PendingIdSequence {
    next: AtomicI64,
}

impl PendingIdSequence {
    /// Create a fresh sequence starting at `-1`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicI64::new(-1),
        }
    }

    /// Allocate the next pending id.
    pub fn next_pending(&self) -> SessionId {
        let id = self.next.fetch_sub(1, Ordering::Relaxed);
        SessionId(id)
    }
}

/// A file attachment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub i64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
