//! Session domain types.
//!
//! A session is one ongoing conversation thread with a fixed mode and an
//! optional persona label, owned by exactly one user. The mode selects the
//! behavioral directive given to the model for every turn in the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The conversational style of a session.
///
/// Always one of these four values; unrecognized strings parse as `Chat`
/// so a stale or hand-edited row can never poison prompt assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Chat,
    Question,
    Teaching,
    Review,
}

impl SessionMode {
    /// Parse a mode string, falling back to `Chat` for unknown values.
    pub fn parse(s: &str) -> Self {
        match s {
            "chat" => Self::Chat,
            "question" => Self::Question,
            "teaching" => Self::Teaching,
            "review" => Self::Review,
            _ => Self::Chat,
        }
    }

    /// Strict parse used at API boundaries where unknown modes are rejected.
    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(Self::Chat),
            "question" => Some(Self::Question),
            "teaching" => Some(Self::Teaching),
            "review" => Some(Self::Review),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Question => "question",
            Self::Teaching => "teaching",
            Self::Review => "review",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archival state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    #[default]
    Active,
    Archived,
}

impl SessionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "ARCHIVED" => Self::Archived,
            _ => Self::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Archived => "ARCHIVED",
        }
    }
}

/// A conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,

    /// The user who owns this session
    pub owner_id: crate::user::UserId,

    /// Optional project this session belongs to (foreign-key placeholder)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Conversational style
    pub mode: SessionMode,

    /// Free-text persona label (e.g. "Python Tutor")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Archival state
    pub status: SessionStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub owner_id: crate::user::UserId,
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub mode: SessionMode,
    pub role: Option<String>,
}
