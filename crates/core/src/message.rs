//! Message domain types.
//!
//! A message is one turn in a session, authored by either the user or the
//! assistant. A user turn and its generated reply are always created as a
//! pair within one authorization check; the assistant turn never exists
//! without a preceding user turn from the same operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionId;
use crate::user::UserId;

/// Maximum accepted message content length, in characters.
pub const MAX_CONTENT_LEN: usize = 10_000;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => Self::Assistant,
            _ => Self::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Content category of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Code,
    Question,
}

impl MessageType {
    pub fn parse(s: &str) -> Self {
        match s {
            "code" => Self::Code,
            "question" => Self::Question,
            _ => Self::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Question => "question",
        }
    }
}

/// A single persisted turn in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Session this turn belongs to
    pub session_id: SessionId,

    /// The user whose send produced this turn (also set on assistant turns)
    pub user_id: UserId,

    /// Who authored this turn
    pub role: MessageRole,

    /// The text content (non-empty after trimming, at most 10,000 chars)
    pub content: String,

    /// Content category
    #[serde(default)]
    pub message_type: MessageType,

    /// Free-form metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a turn.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub role: MessageRole,
    pub content: String,
    pub message_type: MessageType,
}

impl NewMessage {
    /// A user-authored turn.
    pub fn user(
        session_id: SessionId,
        user_id: UserId,
        content: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            session_id,
            user_id,
            role: MessageRole::User,
            content: content.into(),
            message_type,
        }
    }

    /// A generated assistant turn. Assistant replies are always plain text.
    pub fn assistant(session_id: SessionId, user_id: UserId, content: impl Into<String>) -> Self {
        Self {
            session_id,
            user_id,
            role: MessageRole::Assistant,
            content: content.into(),
            message_type: MessageType::Text,
        }
    }
}

impl Message {
    /// Build a persisted message from insert parameters (used by stores
    /// that assign id/timestamp at insert time).
    pub fn from_new(new: NewMessage) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: new.session_id,
            user_id: new.user_id,
            role: new.role,
            content: new.content,
            message_type: new.message_type,
            metadata: serde_json::Map::new(),
            created_at: Utc::now(),
        }
    }
}

/// The result of one send: the persisted user turn and its reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePair {
    pub user_message: Message,
    pub assistant_message: Message,

    /// True when the assistant content is the provider-failure fallback.
    #[serde(default)]
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_turns_are_plain_text() {
        let new = NewMessage::assistant(SessionId::from("s"), UserId::from("u"), "hi");
        assert_eq!(new.role, MessageRole::Assistant);
        assert_eq!(new.message_type, MessageType::Text);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(MessageRole::parse("assistant"), MessageRole::Assistant);
        assert_eq!(MessageRole::parse("user"), MessageRole::User);
    }

    #[test]
    fn message_type_defaults_to_text() {
        assert_eq!(MessageType::parse("text"), MessageType::Text);
        assert_eq!(MessageType::parse("garbage"), MessageType::Text);
        assert_eq!(MessageType::parse("code"), MessageType::Code);
    }
}
