//! The chat send pipeline.
//!
//! One send: authorize → persist user turn → assemble prompt → complete →
//! persist assistant turn → notify live peers → return the pair.
//!
//! Validation, authorization, and not-found abort before any write. A
//! provider failure in lenient mode degrades to the fallback reply instead
//! of aborting, so the user's turn is never lost to a downstream outage. A
//! store failure between the two inserts leaves at most an orphan user
//! turn, never an orphan assistant turn.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use parley_core::error::{ChatError, Error};
use parley_core::event::{SessionEvent, SessionNotifier};
use parley_core::message::{
    MAX_CONTENT_LEN, Message, MessagePair, MessageType, NewMessage,
};
use parley_core::session::{Session, SessionId};
use parley_core::store::{MessageStore, SessionStore, SortOrder};
use parley_core::user::UserId;
use parley_provider::CompletionService;

use crate::prompt::{self, HISTORY_WINDOW};

/// Keyed async locks serializing sends per session.
///
/// Concurrent sends to the same session queue up so the context window of
/// each send reflects fully completed pairs. Idle entries are pruned on the
/// next acquire; cross-session sends never contend.
struct SessionLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Orchestrates a send from validation through notification.
///
/// All collaborators are constructor-injected trait handles; there are no
/// hidden singletons, and tests can swap any of them out.
pub struct ChatPipeline {
    sessions: Arc<dyn SessionStore>,
    messages: Arc<dyn MessageStore>,
    completions: CompletionService,
    notifier: Option<Arc<dyn SessionNotifier>>,
    locks: SessionLocks,
}

impl ChatPipeline {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        messages: Arc<dyn MessageStore>,
        completions: CompletionService,
    ) -> Self {
        Self {
            sessions,
            messages,
            completions,
            notifier: None,
            locks: SessionLocks::new(),
        }
    }

    /// Push persisted turns to live peers after each send.
    pub fn with_notifier(mut self, notifier: Arc<dyn SessionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Submit one user message and return the persisted pair.
    pub async fn send_message(
        &self,
        session_id: &SessionId,
        caller_id: &UserId,
        content: &str,
        message_type: MessageType,
    ) -> Result<MessagePair, Error> {
        if content.trim().is_empty() {
            return Err(ChatError::Validation("Message content cannot be empty".into()).into());
        }
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(ChatError::Validation(format!(
                "Message content too long (max {MAX_CONTENT_LEN} characters)"
            ))
            .into());
        }

        let session = self.authorize(session_id, caller_id).await?;

        // Serialize sends within the session from here on; the window read
        // below must not interleave with another send's inserts.
        let _guard = self.locks.acquire(&session_id.0).await;

        // Window is read before the user insert so the new turn appears in
        // the prompt exactly once, as the final element.
        let history = self
            .messages
            .list_recent(session_id, HISTORY_WINDOW as u32, SortOrder::Asc)
            .await?;

        let user_message = self
            .messages
            .insert(NewMessage::user(
                session_id.clone(),
                caller_id.clone(),
                content,
                message_type,
            ))
            .await?;

        let prompt = prompt::assemble(&session, &history, content);
        let outcome = self.completions.generate(prompt.system, prompt.turns).await?;
        let degraded = outcome.is_degraded();

        let assistant_message = self
            .messages
            .insert(NewMessage::assistant(
                session_id.clone(),
                caller_id.clone(),
                outcome.text(),
            ))
            .await?;

        info!(
            session_id = %session_id,
            user = %caller_id,
            degraded,
            "Message pair persisted"
        );

        self.notify_message(session_id, &user_message).await;
        self.notify_message(session_id, &assistant_message).await;

        Ok(MessagePair {
            user_message,
            assistant_message,
            degraded,
        })
    }

    /// A page of a session's history, oldest first. Pages are 1-indexed.
    pub async fn list_messages(
        &self,
        session_id: &SessionId,
        caller_id: &UserId,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Message>, Error> {
        self.authorize(session_id, caller_id).await?;
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        // Widened before multiplying: u32::MAX * 100 overflows u32, and a
        // page number is caller-controlled input.
        let offset = (page as u64 - 1) * limit as u64;
        Ok(self.messages.list_page(session_id, offset, limit).await?)
    }

    /// Total number of turns in a session.
    pub async fn message_count(
        &self,
        session_id: &SessionId,
        caller_id: &UserId,
    ) -> Result<u64, Error> {
        self.authorize(session_id, caller_id).await?;
        Ok(self.messages.count(session_id).await?)
    }

    async fn authorize(
        &self,
        session_id: &SessionId,
        caller_id: &UserId,
    ) -> Result<Session, Error> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| ChatError::SessionNotFound(session_id.0.clone()))?;

        if &session.owner_id != caller_id {
            return Err(ChatError::NotAuthorized {
                session_id: session_id.0.clone(),
                user_id: caller_id.0.clone(),
            }
            .into());
        }

        Ok(session)
    }

    async fn notify_message(&self, session_id: &SessionId, message: &Message) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        // Assistant turns carry the caller's user_id in storage; peers see
        // them attributed to the assistant.
        let user_id = match message.role {
            parley_core::message::MessageRole::User => message.user_id.0.clone(),
            parley_core::message::MessageRole::Assistant => "assistant".to_string(),
        };
        debug!(session_id = %session_id, "Broadcasting persisted turn");
        notifier
            .notify(
                session_id,
                SessionEvent::Message {
                    user_id,
                    content: message.content.clone(),
                    timestamp: message.created_at,
                },
            )
            .await;
    }
}
