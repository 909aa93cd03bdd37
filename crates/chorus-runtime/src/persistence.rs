//! The `Persistence` collaborator (spec §6) and its in-memory stand-in.
//!
//! Durable storage (SQL schema, ORM choice) is a deliberate non-goal —
//! only the trait and an in-memory implementation are shipped, the same
//! way `chorus-llm`'s real providers sit next to a scripted one and the
//! teacher ships `astrid_storage::kv::MemoryKvStore` alongside the
//! `KvStore` trait it implements.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chorus_core::{ChorusError, ChorusResult, FileId, Message, MessageId, Role, Session, SessionId, TempFile, TempFileStatus, UserId};
use chrono::Utc;

/// Fields needed to append a new message; `id` and `created_at` are
/// assigned by the implementation (spec §3, "Message").
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Owning user.
    pub user_id: UserId,
    /// Owning session.
    pub session_id: SessionId,
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

/// Fields needed to record a newly uploaded attachment; `id`,
/// `status`, and `created_at` are assigned by the implementation.
#[derive(Debug, Clone)]
pub struct NewTempFile {
    /// Owning user.
    pub user_id: UserId,
    /// Owning session.
    pub session_id: SessionId,
    /// Name as uploaded.
    pub display_name: String,
    /// Path in the configured file base directory.
    pub stored_path: String,
    /// MIME type as uploaded.
    pub mime: String,
    /// Size in bytes.
    pub size: u64,
    /// Expiry time.
    pub expires_at: chrono::DateTime<Utc>,
}

/// Durable storage for sessions, messages, and attachments (spec §6).
///
/// Every read enforces ownership: a result belonging to a different
/// user than requested is reported as [`ChorusError::NotFound`], not
/// [`ChorusError::Unauthorized`] — the spec's "NotFound sentinel
/// distinguishable from other errors" covers both "doesn't exist" and
/// "exists, but not yours", so a caller can't distinguish the two and
/// probe for other users' session ids.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Create a new session titled `title` for `user_id`.
    async fn create_session(&self, user_id: UserId, title: &str) -> ChorusResult<Session>;

    /// Fetch a session and its ordered messages. `NotFound` if absent
    /// or owned by a different user.
    async fn get_session_with_messages(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> ChorusResult<(Session, Vec<Message>)>;

    /// Update a session's title.
    async fn update_session_title(
        &self,
        user_id: UserId,
        session_id: SessionId,
        title: &str,
    ) -> ChorusResult<()>;

    /// Append a message, assigning its id and timestamp.
    async fn add_message(&self, message: NewMessage) -> ChorusResult<Message>;

    /// List every attachment recorded for a session.
    async fn list_session_temp_files(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> ChorusResult<Vec<TempFile>>;

    /// Record a file's computed summary and the message it was appended as.
    async fn update_temp_file_summary(
        &self,
        file_id: FileId,
        summary: &str,
        summary_message_id: MessageId,
    ) -> ChorusResult<()>;

    /// Fetch a specific set of attachments by id, respecting ownership
    /// and session scoping.
    async fn get_temp_files_by_ids(
        &self,
        user_id: UserId,
        session_id: SessionId,
        ids: &[FileId],
    ) -> ChorusResult<Vec<TempFile>>;

    /// Delete a session and its messages/attachments.
    async fn delete_session(&self, user_id: UserId, session_id: SessionId) -> ChorusResult<()>;

    /// Record a newly uploaded attachment.
    async fn record_temp_file(&self, file: NewTempFile) -> ChorusResult<TempFile>;

    /// Total bytes of active attachments stored for a user.
    async fn temp_storage_usage(&self, user_id: UserId) -> ChorusResult<u64>;
}

#[derive(Default)]
struct State {
    sessions: HashMap<SessionId, Session>,
    messages: HashMap<SessionId, Vec<Message>>,
    files: HashMap<FileId, TempFile>,
}

/// An in-memory [`Persistence`] implementation, guarded by the same
/// poison-recovering lock discipline as [`crate::user_state::UserState`].
/// Used by `chorus-server` and by the integration tests exercising the
/// S1–S6 scenarios.
pub struct InMemoryPersistence {
    state: Mutex<State>,
    next_session_id: AtomicI64,
    next_message_id: AtomicI64,
    next_file_id: AtomicI64,
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPersistence {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_session_id: AtomicI64::new(1),
            next_message_id: AtomicI64::new(1),
            next_file_id: AtomicI64::new(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn create_session(&self, user_id: UserId, title: &str) -> ChorusResult<Session> {
        let id = SessionId::new(self.next_session_id.fetch_add(1, Ordering::SeqCst));
        let session = Session::new(id, user_id, title);
        let mut state = self.lock();
        state.sessions.insert(id, session.clone());
        state.messages.insert(id, Vec::new());
        Ok(session)
    }

    async fn get_session_with_messages(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> ChorusResult<(Session, Vec<Message>)> {
        let state = self.lock();
        let session = state
            .sessions
            .get(&session_id)
            .filter(|s| s.user_id == user_id)
            .cloned()
            .ok_or_else(|| ChorusError::NotFound(format!("session {session_id}")))?;
        let messages = state.messages.get(&session_id).cloned().unwrap_or_default();
        Ok((session, messages))
    }

    async fn update_session_title(
        &self,
        user_id: UserId,
        session_id: SessionId,
        title: &str,
    ) -> ChorusResult<()> {
        let mut state = self.lock();
        let session = state
            .sessions
            .get_mut(&session_id)
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| ChorusError::NotFound(format!("session {session_id}")))?;
        session.title = title.to_string();
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn add_message(&self, message: NewMessage) -> ChorusResult<Message> {
        let mut state = self.lock();
        if !state
            .sessions
            .get(&message.session_id)
            .is_some_and(|s| s.user_id == message.user_id)
        {
            return Err(ChorusError::NotFound(format!("session {}", message.session_id)));
        }
        let id = MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst));
        let stored = Message {
            id,
            user_id: message.user_id,
            session_id: message.session_id,
            role: message.role,
            content: message.content,
            created_at: Utc::now(),
        };
        state.messages.entry(message.session_id).or_default().push(stored.clone());
        if let Some(session) = state.sessions.get_mut(&message.session_id) {
            session.updated_at = stored.created_at;
        }
        Ok(stored)
    }

    async fn list_session_temp_files(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> ChorusResult<Vec<TempFile>> {
        let state = self.lock();
        Ok(state
            .files
            .values()
            .filter(|f| f.user_id == user_id && f.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn update_temp_file_summary(
        &self,
        file_id: FileId,
        summary: &str,
        summary_message_id: MessageId,
    ) -> ChorusResult<()> {
        let mut state = self.lock();
        let file = state
            .files
            .get_mut(&file_id)
            .ok_or_else(|| ChorusError::NotFound(format!("file {file_id}")))?;
        file.summary = Some(summary.to_string());
        file.summary_message_id = Some(summary_message_id);
        Ok(())
    }

    async fn get_temp_files_by_ids(
        &self,
        user_id: UserId,
        session_id: SessionId,
        ids: &[FileId],
    ) -> ChorusResult<Vec<TempFile>> {
        let state = self.lock();
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            let file = state
                .files
                .get(id)
                .filter(|f| f.user_id == user_id && f.session_id == session_id)
                .cloned()
                .ok_or_else(|| ChorusError::NotFound(format!("file {id}")))?;
            found.push(file);
        }
        Ok(found)
    }

    async fn delete_session(&self, user_id: UserId, session_id: SessionId) -> ChorusResult<()> {
        let mut state = self.lock();
        let owned = state
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.user_id == user_id);
        if !owned {
            return Err(ChorusError::NotFound(format!("session {session_id}")));
        }
        state.sessions.remove(&session_id);
        state.messages.remove(&session_id);
        state.files.retain(|_, f| f.session_id != session_id);
        Ok(())
    }

    async fn record_temp_file(&self, file: NewTempFile) -> ChorusResult<TempFile> {
        let id = FileId(self.next_file_id.fetch_add(1, Ordering::SeqCst));
        let stored = TempFile {
            id,
            user_id: file.user_id,
            session_id: file.session_id,
            display_name: file.display_name,
            stored_path: file.stored_path,
            mime: file.mime,
            size: file.size,
            status: TempFileStatus::Active,
            summary: None,
            summary_message_id: None,
            created_at: Utc::now(),
            expires_at: file.expires_at,
        };
        self.lock().files.insert(id, stored.clone());
        Ok(stored)
    }

    async fn temp_storage_usage(&self, user_id: UserId) -> ChorusResult<u64> {
        Ok(self
            .lock()
            .files
            .values()
            .filter(|f| f.user_id == user_id && f.status == TempFileStatus::Active)
            .map(|f| f.size)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_fetch_round_trips() {
        let store = InMemoryPersistence::new();
        let user = UserId::new(1);
        let session = store.create_session(user, "New Conversation").await.unwrap();
        assert!(session.id.is_real());

        let (fetched, messages) = store.get_session_with_messages(user, session.id).await.unwrap();
        assert_eq!(fetched.id, session.id);
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn fetch_by_wrong_user_is_not_found() {
        let store = InMemoryPersistence::new();
        let session = store.create_session(UserId::new(1), "t").await.unwrap();
        let result = store
            .get_session_with_messages(UserId::new(2), session.id)
            .await;
        assert!(matches!(result, Err(ChorusError::NotFound(_))));
    }

    #[tokio::test]
    async fn add_message_assigns_monotonic_ids() {
        let store = InMemoryPersistence::new();
        let user = UserId::new(1);
        let session = store.create_session(user, "t").await.unwrap();
        let a = store
            .add_message(NewMessage {
                user_id: user,
                session_id: session.id,
                role: Role::User,
                content: "hi".into(),
            })
            .await
            .unwrap();
        let b = store
            .add_message(NewMessage {
                user_id: user,
                session_id: session.id,
                role: Role::Assistant,
                content: "hello".into(),
            })
            .await
            .unwrap();
        assert!(b.id.0 > a.id.0);

        let (_, messages) = store.get_session_with_messages(user, session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn temp_file_summary_round_trips() {
        let store = InMemoryPersistence::new();
        let user = UserId::new(1);
        let session = store.create_session(user, "t").await.unwrap();
        let file = store
            .record_temp_file(NewTempFile {
                user_id: user,
                session_id: session.id,
                display_name: "notes.txt".into(),
                stored_path: "/tmp/notes.txt".into(),
                mime: "text/plain".into(),
                size: 42,
                expires_at: Utc::now() + chrono::Duration::hours(1),
            })
            .await
            .unwrap();
        assert!(!file.is_summarised());

        store
            .update_temp_file_summary(file.id, "a summary", MessageId(99))
            .await
            .unwrap();

        let found = store
            .get_temp_files_by_ids(user, session.id, &[file.id])
            .await
            .unwrap();
        assert_eq!(found[0].summary.as_deref(), Some("a summary"));
        assert_eq!(found[0].summary_message_id, Some(MessageId(99)));
    }
}
