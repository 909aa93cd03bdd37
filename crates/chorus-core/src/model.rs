//! The persisted data model (spec §3): `Session`, `Message`, `TempFile`.

use crate::ids::{FileId, MessageId, SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a persisted conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A message authored by the end user.
    User,
    /// A message authored by the assistant.
    Assistant,
    /// A system-authored message (e.g. a file summary).
    System,
}

/// An ordered, titled conversation belonging to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Positive once persisted; never exposed while pending.
    pub id: SessionId,
    /// Owning user.
    pub user_id: UserId,
    /// Session title, auto-generated from the first turn or user-set.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last-updated time (bumped on title change or new message).
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a freshly-persisted session with the default title.
    #[must_use]
    pub fn new(id: SessionId, user_id: UserId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The title used for a brand-new conversation, before title
    /// generation has run (spec §4.6.1 step 2).
    pub const DEFAULT_TITLE: &'static str = "New Conversation";
}

/// A single, never-mutated conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Persisted message id.
    pub id: MessageId,
    /// Owning user (redundant with session's owner, checked on every read).
    pub user_id: UserId,
    /// Owning session.
    pub session_id: SessionId,
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Creation time; non-decreasing within a session (spec §3 invariant).
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of an uploaded attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempFileStatus {
    /// Uploaded, not yet expired or deleted.
    Active,
    /// Past its `expires_at`; eligible for purge.
    Expired,
    /// Its owning session was deleted.
    Deleted,
}

/// A user-uploaded document referenced by id in a Stream request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempFile {
    /// Attachment id.
    pub id: FileId,
    /// Owning user.
    pub user_id: UserId,
    /// Owning session.
    pub session_id: SessionId,
    /// Name as uploaded by the user.
    pub display_name: String,
    /// Path in the configured file base directory.
    pub stored_path: String,
    /// MIME type as uploaded.
    pub mime: String,
    /// Size in bytes.
    pub size: u64,
    /// Lifecycle status.
    pub status: TempFileStatus,
    /// Computed summary, set the first time the file is referenced in a turn.
    pub summary: Option<String>,
    /// The system message id the summary was appended as, if summarised.
    pub summary_message_id: Option<MessageId>,
    /// Upload time.
    pub created_at: DateTime<Utc>,
    /// Expiry time; summarisation and re-reference are refused past this.
    pub expires_at: DateTime<Utc>,
}

impl TempFile {
    /// Whether the attachment has already been summarised for its session.
    #[must_use]
    pub const fn is_summarised(&self) -> bool {
        self.summary.is_some()
    }

    /// Whether `now` is past this file's expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
