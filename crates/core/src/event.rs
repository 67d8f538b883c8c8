//! Real-time session events.
//!
//! Events are ephemeral: they are fanned out to whichever connections are
//! live at broadcast time and never persisted. Delivery is best-effort,
//! at-most-once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// An event delivered to the live peers of a session.
///
/// The wire format carries a `type` tag so browser clients can switch on it:
/// `{"type": "typing", "user_id": "...", "is_typing": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A peer started or stopped typing.
    Typing { user_id: String, is_typing: bool },

    /// A peer joined the session.
    UserJoined { user_id: String },

    /// A peer disconnected or was dropped.
    UserLeft { user_id: String },

    /// A chat message echo — either a peer-relayed ephemeral frame or a
    /// notification that a turn was just persisted.
    Message {
        user_id: String,
        content: String,
        timestamp: DateTime<Utc>,
    },
}

/// Fire-and-forget push of events to a session's live peers.
///
/// Implemented by the connection registry; the chat pipeline holds this as
/// a trait object so persistence and realtime stay decoupled. Broadcast
/// failures never propagate — a send must not fail because a tab closed.
#[async_trait]
pub trait SessionNotifier: Send + Sync {
    async fn notify(&self, session_id: &SessionId, event: SessionEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_event_wire_format() {
        let event = SessionEvent::Typing {
            user_id: "u-1".into(),
            is_typing: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "typing");
        assert_eq!(json["user_id"], "u-1");
        assert_eq!(json["is_typing"], true);
    }

    #[test]
    fn events_round_trip() {
        let event = SessionEvent::Message {
            user_id: "u-1".into(),
            content: "hello".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
