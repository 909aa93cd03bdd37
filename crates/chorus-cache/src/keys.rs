//! Cache key families (spec §4.7).

use chorus_core::SessionId;
use std::fmt;

/// A structured cache key, rendered to the wire-level key families the
/// spec names: `session:{id}`, `history:{id}`, `files:{id}`, and
/// `auth:token:{t}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A session's metadata (title, owner, timestamps).
    Session(SessionId),
    /// A session's message history.
    History(SessionId),
    /// A session's attachment list.
    Files(SessionId),
    /// A resolved auth token, keyed by the raw token string.
    AuthToken(String),
}

impl CacheKey {
    /// Every key family that should be invalidated when a session's
    /// data changes — used by [`crate::CacheBus`] callers that mutate a
    /// session to fan out a single invalidation call.
    #[must_use]
    pub fn session_family(id: SessionId) -> [Self; 3] {
        [Self::Session(id), Self::History(id), Self::Files(id)]
    }

    /// Convenience constructor mirroring a file's owning session.
    #[must_use]
    pub fn files_for(session_id: SessionId) -> Self {
        Self::Files(session_id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session:{id}"),
            Self::History(id) => write!(f, "history:{id}"),
            Self::Files(id) => write!(f, "files:{id}"),
            Self::AuthToken(token) => write!(f, "auth:token:{token}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_expected_wire_format() {
        assert_eq!(CacheKey::Session(SessionId::new(5)).to_string(), "session:5");
        assert_eq!(CacheKey::History(SessionId::new(5)).to_string(), "history:5");
        assert_eq!(CacheKey::Files(SessionId::new(5)).to_string(), "files:5");
        assert_eq!(
            CacheKey::AuthToken("abc".into()).to_string(),
            "auth:token:abc"
        );
    }

    #[test]
    fn session_family_covers_all_three_keys() {
        let family = CacheKey::session_family(SessionId::new(9));
        assert!(family.contains(&CacheKey::Session(SessionId::new(9))));
        assert!(family.contains(&CacheKey::History(SessionId::new(9))));
        assert!(family.contains(&CacheKey::Files(SessionId::new(9))));
    }
}
