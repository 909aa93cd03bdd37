//! Per-user in-memory cache (spec §4.1).
//!
//! Five mappings keyed by session id — session, history, resources,
//! files, and the ready set — guarded by a single reader/writer lock so
//! the two compound operations (`promote_session`, `purge_cache`) are
//! atomic without a multi-lock ordering discipline. Mutators never call
//! out while holding the write lock, matching the teacher's
//! `AgentRuntime::cleanup_plugin_kv_stores` convention of treating a
//! poisoned lock as recoverable rather than fatal.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use chorus_core::{Message, Session, SessionId};
use chorus_llm::{ChatModel, TitleModel};

/// The `(provider, model, token)` triple a [`SessionResources`] was
/// built for (spec §3 invariant: "`SessionResources.key == (provider,
/// model, token)` exactly; if any differs the struct is rebuilt before
/// use").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKey {
    /// Provider name, e.g. `"claude"`.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Caller-supplied credential, compared only for change detection —
    /// never logged.
    pub token: String,
}

/// Compiled provider clients bound to a `(provider, model, token)` key
/// (spec §3, "SessionResources").
#[derive(Clone)]
pub struct SessionResources {
    /// The key these clients were built for.
    pub key: ResourceKey,
    /// The session's chat model.
    pub chat_model: Arc<dyn ChatModel>,
    /// The session's title/summary model.
    pub title_model: Arc<dyn TitleModel>,
}

#[derive(Default)]
struct Inner {
    session: HashMap<SessionId, Session>,
    history: HashMap<SessionId, Vec<Message>>,
    resources: HashMap<SessionId, SessionResources>,
    files: HashMap<SessionId, Vec<chorus_core::TempFile>>,
    ready: HashSet<SessionId>,
}

/// One user's cached sessions, histories, provider resources, and
/// attachment metadata (spec §4.1).
pub struct UserState {
    inner: RwLock<Inner>,
}

impl Default for UserState {
    fn default() -> Self {
        Self::new()
    }
}

impl UserState {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a session's cache has been primed by `Init` (spec
    /// glossary, "Ready session").
    #[must_use]
    pub fn is_ready(&self, id: SessionId) -> bool {
        self.read().ready.contains(&id)
    }

    /// Mark a session ready without touching any other mapping.
    pub fn mark_ready(&self, id: SessionId) {
        self.write().ready.insert(id);
    }

    /// Fetch the cached session record, if any.
    #[must_use]
    pub fn get_session(&self, id: SessionId) -> Option<Session> {
        self.read().session.get(&id).cloned()
    }

    /// Replace the cached session record.
    pub fn set_session(&self, session: Session) {
        self.write().session.insert(session.id, session);
    }

    /// Fetch the cached history, oldest first.
    #[must_use]
    pub fn get_history(&self, id: SessionId) -> Vec<Message> {
        self.read().history.get(&id).cloned().unwrap_or_default()
    }

    /// Replace a session's cached history wholesale (used when `Init`
    /// loads history from `Persistence`).
    pub fn set_history(&self, id: SessionId, history: Vec<Message>) {
        self.write().history.insert(id, history);
    }

    /// Append one message to a session's cached history.
    pub fn append_message(&self, id: SessionId, message: Message) {
        self.write().history.entry(id).or_default().push(message);
    }

    /// Fetch the cached resources, if built and not yet invalidated.
    #[must_use]
    pub fn get_resources(&self, id: SessionId) -> Option<SessionResources> {
        self.read().resources.get(&id).cloned()
    }

    /// Replace a session's cached resources.
    pub fn set_resources(&self, id: SessionId, resources: SessionResources) {
        self.write().resources.insert(id, resources);
    }

    /// Fetch the cached attachment list.
    #[must_use]
    pub fn get_files(&self, id: SessionId) -> Vec<chorus_core::TempFile> {
        self.read().files.get(&id).cloned().unwrap_or_default()
    }

    /// Replace a session's cached attachment list wholesale.
    pub fn set_files(&self, id: SessionId, files: Vec<chorus_core::TempFile>) {
        self.write().files.insert(id, files);
    }

    /// Update one cached attachment in place (used after summarisation).
    /// A no-op if the file id is not present in the cached list.
    pub fn update_file(&self, id: SessionId, updated: chorus_core::TempFile) {
        let mut inner = self.write();
        if let Some(files) = inner.files.get_mut(&id) {
            if let Some(slot) = files.iter_mut().find(|f| f.id == updated.id) {
                *slot = updated;
            }
        }
    }

    /// Atomically move session, history, and files from `pending` to
    /// `real` and clear the pending `ready` marker (spec §4.1,
    /// `promoteSession`).
    pub fn promote_session(&self, pending: SessionId, real: SessionId) {
        let mut inner = self.write();
        if let Some(session) = inner.session.remove(&pending) {
            inner.session.insert(real, session);
        }
        if let Some(history) = inner.history.remove(&pending) {
            inner.history.insert(real, history);
        }
        if let Some(files) = inner.files.remove(&pending) {
            inner.files.insert(real, files);
        }
        if let Some(resources) = inner.resources.remove(&pending) {
            inner.resources.insert(real, resources);
        }
        inner.ready.remove(&pending);
        inner.ready.insert(real);
    }

    /// Delete every mapping for one session (spec §4.1, `purgeCache`).
    pub fn purge_cache(&self, id: SessionId) {
        let mut inner = self.write();
        inner.session.remove(&id);
        inner.history.remove(&id);
        inner.resources.remove(&id);
        inner.files.remove(&id);
        inner.ready.remove(&id);
    }

    /// Drop just the attachment cache for a session (spec §4.5,
    /// `InvalidateTempFiles`): next `Stream` re-reads from Persistence.
    pub fn clear_files(&self, id: SessionId) {
        self.write().files.remove(&id);
    }

    /// Empty every mapping (spec §4.1, `reset`).
    pub fn reset(&self) {
        *self.write() = Inner::default();
    }

    /// Every session id this cache currently holds any mapping for,
    /// deduplicated across all five maps — used by `Manager::reset_user`
    /// to build a user-wide cache invalidation before wiping the state
    /// that would otherwise answer this question (spec §4.7).
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        let inner = self.read();
        let mut ids: HashSet<SessionId> = HashSet::new();
        ids.extend(inner.session.keys().copied());
        ids.extend(inner.history.keys().copied());
        ids.extend(inner.resources.keys().copied());
        ids.extend(inner.files.keys().copied());
        ids.extend(inner.ready.iter().copied());
        ids.into_iter().collect()
    }

    /// Every distinct provider credential currently bound into this
    /// user's cached `SessionResources`, so a user-wide invalidation can
    /// also drop the matching `CacheKey::AuthToken` entries.
    #[must_use]
    pub fn auth_tokens(&self) -> Vec<String> {
        let inner = self.read();
        inner
            .resources
            .values()
            .map(|resources| resources.key.token.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect()
    }
}

impl std::fmt::Debug for UserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("UserState")
            .field("sessions", &inner.session.len())
            .field("ready", &inner.ready.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::{Role, UserId};

    fn msg(session: SessionId, content: &str) -> Message {
        Message {
            id: chorus_core::MessageId(1),
            user_id: UserId::new(1),
            session_id: session,
            role: Role::User,
            content: content.into(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn promote_session_moves_all_mappings_and_clears_pending_ready() {
        let state = UserState::new();
        let pending = SessionId::new(-1);
        let real = SessionId::new(42);

        state.set_session(Session::new(pending, UserId::new(1), Session::DEFAULT_TITLE));
        state.append_message(pending, msg(pending, "hi"));
        state.mark_ready(pending);

        state.promote_session(pending, real);

        assert!(!state.is_ready(pending));
        assert!(state.is_ready(real));
        assert!(state.get_session(pending).is_none());
        assert_eq!(state.get_session(real).unwrap().id, real);
        assert_eq!(state.get_history(real).len(), 1);
        assert!(state.get_history(pending).is_empty());
    }

    #[test]
    fn purge_cache_removes_every_mapping_for_one_session() {
        let state = UserState::new();
        let id = SessionId::new(7);
        state.set_session(Session::new(id, UserId::new(1), "t"));
        state.append_message(id, msg(id, "hi"));
        state.mark_ready(id);

        state.purge_cache(id);

        assert!(state.get_session(id).is_none());
        assert!(state.get_history(id).is_empty());
        assert!(!state.is_ready(id));
    }

    #[test]
    fn reset_empties_every_mapping() {
        let state = UserState::new();
        state.set_session(Session::new(SessionId::new(1), UserId::new(1), "t"));
        state.mark_ready(SessionId::new(1));
        state.reset();
        assert!(state.get_session(SessionId::new(1)).is_none());
        assert!(!state.is_ready(SessionId::new(1)));
    }
}
