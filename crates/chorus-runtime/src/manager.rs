//! The [`Manager`]: owns the pool, dispatcher, and per-user caches, and
//! implements the `TaskExecutor` algorithms (spec §4.5–§4.6).
//!
//! Cyclic ownership between Manager, Dispatcher, and Worker is broken
//! the way the spec's design notes (§9) prescribe: `Manager` is the
//! sole owner of a `Dispatcher`; jobs close over a cloned `Manager`
//! handle rather than the other way around, so no component holds a
//! back-reference beyond what its own task loop needs.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chorus_cache::{CacheBus, CacheKey};
use chorus_core::{ChorusError, ChorusResult, FileId, Message, Role, Session, SessionId, UserId};
use chorus_dispatch::{Dispatcher, JobFuture};
use chorus_llm::{
    ChatModel, Message as LlmMessage, ProviderFactory, StreamEvent as LlmStreamEvent, TitleModel,
};
use futures::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::file_loader::FileLoader;
use crate::persistence::{NewMessage, Persistence};
use crate::protocol::{ChunkFn, StreamEvent};
use crate::user_state::{ResourceKey, SessionResources, UserState};

/// Request to create or resume a session (spec §4.5, `InitSession`).
#[derive(Clone)]
pub struct InitRequest {
    /// The requesting user.
    pub user_id: UserId,
    /// `SessionId::create_new()` to start a new session; otherwise the
    /// session to resume.
    pub session_id: SessionId,
    /// Provider name, e.g. `"claude"`.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Provider credential.
    pub token: String,
}

/// Request to run one streaming turn (spec §4.5, `Stream`).
pub struct StreamRequest {
    /// The requesting user.
    pub user_id: UserId,
    /// The session to turn in; may be `SessionId::create_new()`, in
    /// which case `Manager::stream` first runs `InitSession`.
    pub session_id: SessionId,
    /// Provider name.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Provider credential.
    pub token: String,
    /// The user's turn, already persisted by the caller (spec §4.6.2:
    /// "the persisted copy is created by the HTTP layer before the
    /// stream call to power the `ack` event").
    pub user_message: Message,
    /// Attachment ids referenced by this turn.
    pub file_ids: Vec<FileId>,
}

/// Which cached entries an invalidation drops (spec §4.7,
/// `InvalidateMessage{userId, sessionId, scope}`).
#[derive(Debug, Clone)]
enum InvalidationScope {
    /// A single session's metadata, history, and files.
    Session(SessionId),
    /// Just a session's attachment list.
    Files(SessionId),
    /// Every session a user's cache currently knows about, plus any
    /// auth-token entries resolved for them — used by `ResetUser`,
    /// which has no single `session_id` to scope the fan-out to.
    User {
        session_ids: Vec<SessionId>,
        tokens: Vec<String>,
    },
}

/// Orchestrator owning the pool, dispatcher, and per-user [`UserState`]
/// map (spec §2, "Manager").
#[derive(Clone)]
pub struct Manager {
    dispatcher: Dispatcher,
    user_states: Arc<RwLock<HashMap<UserId, Arc<UserState>>>>,
    persistence: Arc<dyn Persistence>,
    provider_factory: Arc<dyn ProviderFactory>,
    file_loader: Arc<dyn FileLoader>,
    cache_bus: Option<Arc<dyn CacheBus>>,
    pending_ids: Arc<chorus_core::PendingIdSequence>,
    config: RuntimeConfig,
}

impl Manager {
    /// Build a manager over the given collaborators. `cache_bus` is the
    /// optional `DistributedCache` (spec §4.7); omit it for a
    /// single-node deployment.
    #[must_use]
    pub fn new(
        config: RuntimeConfig,
        persistence: Arc<dyn Persistence>,
        provider_factory: Arc<dyn ProviderFactory>,
        file_loader: Arc<dyn FileLoader>,
        cache_bus: Option<Arc<dyn CacheBus>>,
    ) -> Self {
        let dispatcher = Dispatcher::new(config.dispatcher);
        Self {
            dispatcher,
            user_states: Arc::new(RwLock::new(HashMap::new())),
            persistence,
            provider_factory,
            file_loader,
            cache_bus,
            pending_ids: Arc::new(chorus_core::PendingIdSequence::new()),
            config,
        }
    }

    fn user_state_for(&self, user_id: UserId) -> Arc<UserState> {
        if let Some(state) = self
            .user_states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
        {
            return state.clone();
        }
        self.user_states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_insert_with(|| Arc::new(UserState::new()))
            .clone()
    }

    /// Create or resume a session (spec §4.5).
    ///
    /// Assigns a pending id when `req.session_id == SessionId::create_new()`,
    /// short-circuits with the cached session if already ready, otherwise
    /// enqueues an `Init` job and blocks on its reply.
    pub async fn init_session(&self, req: InitRequest) -> ChorusResult<Session> {
        if req.session_id.0 < 0 {
            return Err(ChorusError::Validation(
                "session id must not be negative on the wire".into(),
            ));
        }

        let user_state = self.user_state_for(req.user_id);
        let session_id = if req.session_id == SessionId::create_new() {
            self.pending_ids.next_pending()
        } else {
            req.session_id
        };

        if user_state.is_ready(session_id) {
            if let Some(session) = user_state.get_session(session_id) {
                debug!(user_id = %req.user_id, session_id = %session_id, "init short-circuit: already ready");
                return Ok(session);
            }
        }

        let (tx, rx) = oneshot::channel();
        let manager = self.clone();
        let InitRequest {
            user_id,
            provider,
            model,
            token,
            ..
        } = req;

        self.dispatcher
            .enqueue_job(
                user_id,
                Box::new(move || -> JobFuture {
                    Box::pin(async move {
                        let result = manager
                            .handle_init(user_id, session_id, provider, model, token)
                            .await;
                        let _ = tx.send(result);
                    })
                }),
            )
            .await?;

        rx.await
            .map_err(|_| ChorusError::Internal("init reply channel closed".into()))?
    }

    /// Run one streaming turn (spec §4.5).
    ///
    /// Ensures the session is ready (running `InitSession` first if
    /// not), then enqueues a `Stream` job and blocks on its reply,
    /// emitting incremental chunks through `chunk_fn` as they arrive.
    pub async fn stream(
        &self,
        mut req: StreamRequest,
        chunk_fn: ChunkFn,
    ) -> ChorusResult<(Message, Option<String>)> {
        if req.session_id.0 < 0 {
            return Err(ChorusError::Validation(
                "session id must not be negative on the wire".into(),
            ));
        }
        if req.user_message.content.trim().is_empty() {
            return Err(ChorusError::Validation(
                "message content must not be empty".into(),
            ));
        }

        let user_state = self.user_state_for(req.user_id);
        if !user_state.is_ready(req.session_id) {
            let session = self
                .init_session(InitRequest {
                    user_id: req.user_id,
                    session_id: req.session_id,
                    provider: req.provider.clone(),
                    model: req.model.clone(),
                    token: req.token.clone(),
                })
                .await?;
            req.session_id = session.id;
        }

        let (tx, rx) = oneshot::channel();
        let manager = self.clone();
        let user_id = req.user_id;
        let deadline = self.config.stream_deadline;

        self.dispatcher
            .enqueue_job(
                user_id,
                Box::new(move || -> JobFuture {
                    Box::pin(async move {
                        let result = tokio::time::timeout(deadline, manager.handle_stream(req, chunk_fn))
                            .await
                            .unwrap_or(Err(ChorusError::Cancelled));
                        let _ = tx.send(result);
                    })
                }),
            )
            .await?;

        rx.await
            .map_err(|_| ChorusError::Internal("stream reply channel closed".into()))?
    }

    /// Drop a session's cache entries and delete it from Persistence
    /// (spec §4.5, `Purge`).
    pub async fn purge(&self, user_id: UserId, session_id: SessionId) -> ChorusResult<()> {
        self.persistence.delete_session(user_id, session_id).await?;
        self.user_state_for(user_id).purge_cache(session_id);
        self.publish_invalidation(InvalidationScope::Session(session_id)).await;
        info!(user_id = %user_id, session_id = %session_id, "session purged");
        Ok(())
    }

    /// Cancel a user's pending jobs, empty their cache, and publish a
    /// user-scoped invalidation so a sibling node drops every cache
    /// entry tied to this user rather than keep serving stale history
    /// or identity for them (spec §4.5, `ResetUser`; §4.7,
    /// `InvalidateMessage{scope: user}`).
    pub async fn reset_user(&self, user_id: UserId) -> ChorusResult<()> {
        self.dispatcher.cancel_user(user_id).await;
        let state = self.user_state_for(user_id);
        let session_ids = state.session_ids();
        let tokens = state.auth_tokens();
        state.reset();
        self.publish_invalidation(InvalidationScope::User { session_ids, tokens }).await;
        info!(user_id = %user_id, "user state reset");
        Ok(())
    }

    /// Drop a session's cached attachment list so the next `Stream`
    /// re-reads from Persistence (spec §4.5, `InvalidateTempFiles`).
    pub async fn invalidate_temp_files(&self, user_id: UserId, session_id: SessionId) -> ChorusResult<()> {
        self.user_state_for(user_id).clear_files(session_id);
        self.publish_invalidation(InvalidationScope::Files(session_id)).await;
        Ok(())
    }

    /// Fan out a cache invalidation to the optional `DistributedCache`.
    /// Every failure here is logged and swallowed (spec §9's resolved
    /// Open Question): the cache is a performance layer, never a
    /// source of truth, so its own failures never abort a caller's
    /// operation.
    async fn publish_invalidation(&self, scope: InvalidationScope) {
        let Some(cache) = &self.cache_bus else {
            return;
        };
        let keys: Vec<CacheKey> = match &scope {
            InvalidationScope::Session(id) => CacheKey::session_family(*id).to_vec(),
            InvalidationScope::Files(id) => vec![CacheKey::files_for(*id)],
            InvalidationScope::User { session_ids, tokens } => session_ids
                .iter()
                .flat_map(|id| CacheKey::session_family(*id))
                .chain(tokens.iter().cloned().map(CacheKey::AuthToken))
                .collect(),
        };
        if keys.is_empty() {
            return;
        }
        if let Err(e) = cache.invalidate_many(&keys).await {
            warn!(?scope, error = %e, "cache invalidation failed; continuing");
        }
    }

    /// `handleInit` (spec §4.6.1).
    async fn handle_init(
        &self,
        user_id: UserId,
        session_id: SessionId,
        provider: String,
        model: String,
        token: String,
    ) -> ChorusResult<Session> {
        let user_state = self.user_state_for(user_id);

        if session_id.is_real() {
            let (session, messages) = self
                .persistence
                .get_session_with_messages(user_id, session_id)
                .await?;
            if let Err(e) = self
                .ensure_resources(&user_state, session_id, &provider, &model, &token)
                .await
            {
                user_state.purge_cache(session_id);
                return Err(e);
            }
            user_state.set_session(session.clone());
            user_state.set_history(session_id, messages);
            user_state.mark_ready(session_id);
            debug!(user_id = %user_id, session_id = %session_id, "session resumed");
            return Ok(session);
        }

        // Pending id: create a fresh session, then promote the cache
        // entry in one atomic move (spec §3 invariant: a pending id
        // never reaches Persistence).
        let session = match self
            .persistence
            .create_session(user_id, Session::DEFAULT_TITLE)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                user_state.purge_cache(session_id);
                return Err(e);
            }
        };
        let real_id = session.id;

        if let Err(e) = self
            .ensure_resources(&user_state, real_id, &provider, &model, &token)
            .await
        {
            user_state.purge_cache(session_id);
            return Err(e);
        }

        user_state.set_session(session.clone());
        user_state.set_history(real_id, Vec::new());
        user_state.promote_session(session_id, real_id);
        user_state.mark_ready(real_id);
        info!(user_id = %user_id, pending_id = %session_id, real_id = %real_id, "session created");
        Ok(session)
    }

    /// `ensureResources` (spec §4.6.3).
    async fn ensure_resources(
        &self,
        user_state: &UserState,
        session_id: SessionId,
        provider: &str,
        model: &str,
        token: &str,
    ) -> ChorusResult<SessionResources> {
        let key = ResourceKey {
            provider: provider.to_string(),
            model: model.to_string(),
            token: token.to_string(),
        };
        if let Some(existing) = user_state.get_resources(session_id) {
            if existing.key == key {
                return Ok(existing);
            }
        }
        let (chat_model, title_model) = self
            .provider_factory
            .build(provider, model, token)
            .await
            .map_err(|e| ChorusError::Resource(e.to_string()))?;
        let resources = SessionResources {
            key,
            chat_model,
            title_model,
        };
        user_state.set_resources(session_id, resources.clone());
        debug!(session_id = %session_id, provider, model, "session resources (re)built");
        Ok(resources)
    }

    /// `handleStream` (spec §4.6.2): runs the turn, then emits a
    /// terminal `done`/`error` event through `chunk_fn` alongside the
    /// returned result (spec §6, "communicated through `ChunkFn` plus
    /// the returned tuple").
    async fn handle_stream(
        &self,
        req: StreamRequest,
        mut chunk_fn: ChunkFn,
    ) -> ChorusResult<(Message, Option<String>)> {
        let user_message = req.user_message.clone();
        let result = self.run_stream_turn(req, &mut chunk_fn).await;
        match &result {
            Ok((assistant_message, title)) => {
                let _ = chunk_fn(StreamEvent::Done {
                    user_message,
                    assistant_message: assistant_message.clone(),
                    title: title.clone(),
                });
            }
            Err(e) => {
                let _ = chunk_fn(StreamEvent::Error {
                    message: e.to_string(),
                });
            }
        }
        result
    }

    async fn run_stream_turn(
        &self,
        req: StreamRequest,
        chunk_fn: &mut ChunkFn,
    ) -> ChorusResult<(Message, Option<String>)> {
        let user_state = self.user_state_for(req.user_id);
        let now = chrono::Utc::now();

        // Step 1: load attachments referenced by this turn.
        let files = if req.file_ids.is_empty() {
            Vec::new()
        } else {
            let files = self
                .persistence
                .get_temp_files_by_ids(req.user_id, req.session_id, &req.file_ids)
                .await?;
            for file in &files {
                if file.is_expired_at(now) {
                    return Err(ChorusError::NotFound(format!("file {} expired", file.id)));
                }
            }
            user_state.set_files(req.session_id, files.clone());
            files
        };

        // Step 2: resources.
        let resources = self
            .ensure_resources(&user_state, req.session_id, &req.provider, &req.model, &req.token)
            .await?;

        // Step 3: title generation, iff no prior user-role message.
        let history_before = user_state.get_history(req.session_id);
        let has_user_message = history_before.iter().any(|m| m.role == Role::User);
        let mut title = None;
        if !has_user_message {
            let wire = vec![LlmMessage::user(req.user_message.content.clone())];
            let generated = resources
                .title_model
                .generate(&wire)
                .await
                .map_err(|e| ChorusError::Provider(e.to_string()))?;
            let trimmed = generated.trim();
            if !trimmed.is_empty() {
                self.persistence
                    .update_session_title(req.user_id, req.session_id, trimmed)
                    .await?;
                if let Some(mut session) = user_state.get_session(req.session_id) {
                    session.title = trimmed.to_string();
                    user_state.set_session(session);
                }
                title = Some(trimmed.to_string());
            }
        }

        // Step 4: summarise each referenced file without a stored summary.
        // Any failure aborts the whole turn (spec §4.6.2 tie-break: the
        // resulting context would otherwise be incomplete).
        for file in &files {
            if file.is_summarised() {
                continue;
            }
            let docs = self.file_loader.load(&file.stored_path).await?;
            let content = docs.join("\n");
            if content.trim().is_empty() {
                return Err(ChorusError::Validation(format!(
                    "attachment {} has empty content",
                    file.id
                )));
            }
            let wire = vec![LlmMessage::user(content)];
            let summary = resources
                .title_model
                .summarize_file(&wire)
                .await
                .map_err(|e| ChorusError::Provider(e.to_string()))?;
            let header = format!("Summary of {} (file_id={}):\n{}", file.display_name, file.id, summary);
            let system_message = self
                .persistence
                .add_message(NewMessage {
                    user_id: req.user_id,
                    session_id: req.session_id,
                    role: Role::System,
                    content: header,
                })
                .await?;
            self.persistence
                .update_temp_file_summary(file.id, &summary, system_message.id)
                .await?;
            user_state.append_message(req.session_id, system_message.clone());

            let mut updated = file.clone();
            updated.summary = Some(summary);
            updated.summary_message_id = Some(system_message.id);
            user_state.update_file(req.session_id, updated);
        }

        // Step 5: stream the assistant's reply.
        user_state.append_message(req.session_id, req.user_message.clone());
        let history = user_state.get_history(req.session_id);
        let wire_history: Vec<LlmMessage> = history.iter().map(core_message_to_wire).collect();

        let mut provider_stream = resources
            .chat_model
            .stream(&wire_history)
            .await
            .map_err(|e| ChorusError::Provider(e.to_string()))?;

        let mut cumulative = String::new();
        while let Some(event) = provider_stream.next().await {
            match event.map_err(|e| ChorusError::Provider(e.to_string()))? {
                LlmStreamEvent::TextDelta(delta) => {
                    cumulative.push_str(&delta);
                    chunk_fn(StreamEvent::Stream {
                        session_id: req.session_id,
                        text: cumulative.clone(),
                    })?;
                }
                LlmStreamEvent::Usage { .. } => {}
                LlmStreamEvent::Done => break,
                LlmStreamEvent::Error(message) => return Err(ChorusError::Provider(message)),
            }
        }

        let assistant_message = self
            .persistence
            .add_message(NewMessage {
                user_id: req.user_id,
                session_id: req.session_id,
                role: Role::Assistant,
                content: cumulative,
            })
            .await?;
        user_state.append_message(req.session_id, assistant_message.clone());

        Ok((assistant_message, title))
    }
}

fn core_message_to_wire(message: &Message) -> LlmMessage {
    let role = match message.role {
        Role::User => chorus_llm::MessageRole::User,
        Role::Assistant => chorus_llm::MessageRole::Assistant,
        Role::System => chorus_llm::MessageRole::System,
    };
    LlmMessage {
        role,
        content: message.content.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_loader::LocalFileLoader;
    use crate::persistence::InMemoryPersistence;
    use chorus_llm::testutil::ScriptedProviderFactory;

    fn test_manager(reply: &str, title: &str) -> Manager {
        let mut config = RuntimeConfig::default();
        config.dispatcher.min_workers = 1;
        config.dispatcher.max_workers = 2;
        Manager::new(
            config,
            Arc::new(InMemoryPersistence::new()),
            Arc::new(ScriptedProviderFactory::replying(reply, title)),
            Arc::new(LocalFileLoader::new(std::env::temp_dir())),
            None,
        )
    }

    fn collect_chunk_fn() -> (ChunkFn, Arc<std::sync::Mutex<Vec<StreamEvent>>>) {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = events.clone();
        let chunk_fn: ChunkFn = Box::new(move |event| {
            sink.lock().unwrap().push(event);
            Ok(())
        });
        (chunk_fn, events)
    }

    #[tokio::test]
    async fn init_then_stream_produces_a_title_on_the_first_turn() {
        let manager = test_manager("Hi Bob!", "Greeting Bob");

        let session = manager
            .init_session(InitRequest {
                user_id: UserId::new(1),
                session_id: SessionId::create_new(),
                provider: "claude".into(),
                model: "m".into(),
                token: "t".into(),
            })
            .await
            .unwrap();
        assert!(session.id.is_real());

        let user_message = Message {
            id: chorus_core::MessageId(1),
            user_id: UserId::new(1),
            session_id: session.id,
            role: Role::User,
            content: "Hello, my name is Bob.".into(),
            created_at: chrono::Utc::now(),
        };

        let (chunk_fn, events) = collect_chunk_fn();
        let (assistant, title) = manager
            .stream(
                StreamRequest {
                    user_id: UserId::new(1),
                    session_id: session.id,
                    provider: "claude".into(),
                    model: "m".into(),
                    token: "t".into(),
                    user_message,
                    file_ids: Vec::new(),
                },
                chunk_fn,
            )
            .await
            .unwrap();

        assert_eq!(assistant.content, "Hi Bob!");
        assert_eq!(title.as_deref(), Some("Greeting Bob"));
        let events = events.lock().unwrap();
        assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn second_turn_on_same_session_has_no_title() {
        let manager = test_manager("reply", "Untitled");
        let session = manager
            .init_session(InitRequest {
                user_id: UserId::new(1),
                session_id: SessionId::create_new(),
                provider: "claude".into(),
                model: "m".into(),
                token: "t".into(),
            })
            .await
            .unwrap();

        let first_message = |content: &str| Message {
            id: chorus_core::MessageId(0),
            user_id: UserId::new(1),
            session_id: session.id,
            role: Role::User,
            content: content.to_string(),
            created_at: chrono::Utc::now(),
        };

        let (chunk_fn, _) = collect_chunk_fn();
        manager
            .stream(
                StreamRequest {
                    user_id: UserId::new(1),
                    session_id: session.id,
                    provider: "claude".into(),
                    model: "m".into(),
                    token: "t".into(),
                    user_message: first_message("Hello, my name is Bob."),
                    file_ids: Vec::new(),
                },
                chunk_fn,
            )
            .await
            .unwrap();

        let (chunk_fn, _) = collect_chunk_fn();
        let (_, title) = manager
            .stream(
                StreamRequest {
                    user_id: UserId::new(1),
                    session_id: session.id,
                    provider: "claude".into(),
                    model: "m".into(),
                    token: "t".into(),
                    user_message: first_message("What was my name?"),
                    file_ids: Vec::new(),
                },
                chunk_fn,
            )
            .await
            .unwrap();

        assert!(title.is_none());
    }

    #[tokio::test]
    async fn init_with_zero_session_id_twice_reuses_the_cache() {
        let manager = test_manager("reply", "Untitled");
        let first = manager
            .init_session(InitRequest {
                user_id: UserId::new(1),
                session_id: SessionId::create_new(),
                provider: "claude".into(),
                model: "m".into(),
                token: "t".into(),
            })
            .await
            .unwrap();

        let second = manager
            .init_session(InitRequest {
                user_id: UserId::new(1),
                session_id: first.id,
                provider: "claude".into(),
                model: "m".into(),
                token: "t".into(),
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn empty_message_content_is_rejected() {
        let manager = test_manager("reply", "Untitled");
        let session = manager
            .init_session(InitRequest {
                user_id: UserId::new(1),
                session_id: SessionId::create_new(),
                provider: "claude".into(),
                model: "m".into(),
                token: "t".into(),
            })
            .await
            .unwrap();

        let (chunk_fn, _) = collect_chunk_fn();
        let err = manager
            .stream(
                StreamRequest {
                    user_id: UserId::new(1),
                    session_id: session.id,
                    provider: "claude".into(),
                    model: "m".into(),
                    token: "t".into(),
                    user_message: Message {
                        id: chorus_core::MessageId(0),
                        user_id: UserId::new(1),
                        session_id: session.id,
                        role: Role::User,
                        content: "   ".into(),
                        created_at: chrono::Utc::now(),
                    },
                    file_ids: Vec::new(),
                },
                chunk_fn,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ChorusError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_file_id_fails_before_any_provider_call() {
        let manager = test_manager("reply", "Untitled");
        let session = manager
            .init_session(InitRequest {
                user_id: UserId::new(1),
                session_id: SessionId::create_new(),
                provider: "claude".into(),
                model: "m".into(),
                token: "t".into(),
            })
            .await
            .unwrap();

        let (chunk_fn, _) = collect_chunk_fn();
        let err = manager
            .stream(
                StreamRequest {
                    user_id: UserId::new(1),
                    session_id: session.id,
                    provider: "claude".into(),
                    model: "m".into(),
                    token: "t".into(),
                    user_message: Message {
                        id: chorus_core::MessageId(0),
                        user_id: UserId::new(1),
                        session_id: session.id,
                        role: Role::User,
                        content: "see attached".into(),
                        created_at: chrono::Utc::now(),
                    },
                    file_ids: vec![FileId(999)],
                },
                chunk_fn,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ChorusError::NotFound(_)));
    }

    #[tokio::test]
    async fn changing_the_resource_key_rebuilds_exactly_once() {
        let manager = test_manager("reply", "Untitled");
        let session = manager
            .init_session(InitRequest {
                user_id: UserId::new(1),
                session_id: SessionId::create_new(),
                provider: "claude".into(),
                model: "m".into(),
                token: "t".into(),
            })
            .await
            .unwrap();

        let message = |content: &str| Message {
            id: chorus_core::MessageId(0),
            user_id: UserId::new(1),
            session_id: session.id,
            role: Role::User,
            content: content.to_string(),
            created_at: chrono::Utc::now(),
        };

        let (chunk_fn, _) = collect_chunk_fn();
        manager
            .stream(
                StreamRequest {
                    user_id: UserId::new(1),
                    session_id: session.id,
                    provider: "claude".into(),
                    model: "m".into(),
                    token: "t".into(),
                    user_message: message("first"),
                    file_ids: Vec::new(),
                },
                chunk_fn,
            )
            .await
            .unwrap();

        let resources_before = manager
            .user_state_for(UserId::new(1))
            .get_resources(session.id)
            .unwrap();

        let (chunk_fn, _) = collect_chunk_fn();
        manager
            .stream(
                StreamRequest {
                    user_id: UserId::new(1),
                    session_id: session.id,
                    provider: "claude".into(),
                    model: "a-different-model".into(),
                    token: "t".into(),
                    user_message: message("second"),
                    file_ids: Vec::new(),
                },
                chunk_fn,
            )
            .await
            .unwrap();

        let resources_after = manager
            .user_state_for(UserId::new(1))
            .get_resources(session.id)
            .unwrap();

        assert_ne!(resources_before.key, resources_after.key);
        assert_eq!(
            manager.user_state_for(UserId::new(1)).get_history(session.id).len(),
            4
        );
    }
}
