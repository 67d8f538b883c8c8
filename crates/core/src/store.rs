//! Persistence traits.
//!
//! The stores own their rows exclusively: the chat pipeline and gateway
//! only ever touch sessions, messages, and users through these traits and
//! never assume direct mutability of rows held by other requests. Each
//! implementation is expected to provide its own transactional isolation.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{Message, NewMessage};
use crate::session::{NewSession, Session, SessionId, SessionMode, SessionStatus};
use crate::user::{NewUser, User, UserId};

/// Ordering for history reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first — the order context assembly needs.
    Asc,
    /// Newest first — typical display order.
    Desc,
}

/// Durable storage of sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, new: NewSession) -> Result<Session, StoreError>;

    async fn get(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    async fn list_for_owner(
        &self,
        owner_id: &UserId,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, StoreError>;

    async fn set_mode(&self, id: &SessionId, mode: SessionMode) -> Result<Session, StoreError>;

    async fn set_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
    ) -> Result<Session, StoreError>;

    /// Delete a session. Cascades to its messages.
    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError>;
}

/// Append-only per-session ordered log of turns.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, new: NewMessage) -> Result<Message, StoreError>;

    /// The `limit` most recent turns for a session. With `SortOrder::Asc`
    /// the result is still the most recent window, returned oldest-first.
    async fn list_recent(
        &self,
        session_id: &SessionId,
        limit: u32,
        order: SortOrder,
    ) -> Result<Vec<Message>, StoreError>;

    /// A page of turns, always oldest-first. `offset` is u64 because it is
    /// a page-times-limit product; an offset past the end yields an empty
    /// page, not an error.
    async fn list_page(
        &self,
        session_id: &SessionId,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError>;

    async fn count(&self, session_id: &SessionId) -> Result<u64, StoreError>;
}

/// Durable storage of accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;

    async fn get(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}
