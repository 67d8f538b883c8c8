//! Per-session WebSocket channel.
//!
//! A client connects to `/ws/sessions/{id}?token=...`. The token is
//! verified before the session's event stream is attached; a missing or
//! bad token still completes the upgrade, then closes with policy code
//! 1008 so browser clients get a real close frame instead of a failed
//! handshake.
//!
//! Inbound frames are ephemeral relays (typing indicators, raw message
//! echoes) fanned out to the session's other peers. Persisted turns reach
//! peers through the registry via the chat pipeline, not through this
//! loop.

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use parley_core::event::SessionEvent;
use parley_core::session::SessionId;
use parley_core::user::UserId;

use crate::SharedState;

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// A frame sent by a connected client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundFrame {
    Typing {
        is_typing: bool,
    },
    Message {
        content: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
}

pub async fn session_ws_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let verified = query
        .token
        .as_deref()
        .map(|token| state.tokens.verify(token));

    match verified {
        Some(Ok(user_id)) => ws.on_upgrade(move |socket| {
            run_session_socket(state, SessionId::from(&id), user_id, socket)
        }),
        _ => ws.on_upgrade(reject_unauthorized),
    }
}

/// Complete the upgrade, then close immediately with a policy violation.
async fn reject_unauthorized(mut socket: WebSocket) {
    debug!("Rejecting socket without a valid token");
    let _ = socket
        .send(WsMessage::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: "Invalid or missing token".into(),
        })))
        .await;
}

async fn run_session_socket(
    state: SharedState,
    session_id: SessionId,
    user_id: UserId,
    socket: WebSocket,
) {
    let (connection, mut events) = state.registry.join(&session_id).await;
    info!(session_id = %session_id, user = %user_id, connection = %connection, "Socket attached");

    state
        .registry
        .broadcast(
            &session_id,
            SessionEvent::UserJoined {
                user_id: user_id.0.clone(),
            },
        )
        .await;

    let (mut sink, mut stream) = socket.split();

    // Drain the registry queue into the socket until either side closes.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(json) => WsMessage::Text(json.into()),
                Err(e) => {
                    warn!(error = %e, "Dropping unserializable event");
                    continue;
                }
            };
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    relay_frame(&state, &session_id, &user_id, &text).await;
                }
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {} // ping/pong/binary: nothing to relay
            },
        }
    }

    send_task.abort();
    state.registry.leave(&session_id, connection).await;
    state
        .registry
        .broadcast(
            &session_id,
            SessionEvent::UserLeft {
                user_id: user_id.0.clone(),
            },
        )
        .await;
    info!(session_id = %session_id, user = %user_id, connection = %connection, "Socket detached");
}

/// Fan an inbound client frame out to the session's peers. Unparseable
/// frames are dropped; one confused client must not kill the connection.
async fn relay_frame(state: &SharedState, session_id: &SessionId, user_id: &UserId, text: &str) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(session_id = %session_id, error = %e, "Ignoring malformed frame");
            return;
        }
    };

    let event = match frame {
        InboundFrame::Typing { is_typing } => SessionEvent::Typing {
            user_id: user_id.0.clone(),
            is_typing,
        },
        InboundFrame::Message { content, timestamp } => SessionEvent::Message {
            user_id: user_id.0.clone(),
            content,
            timestamp: timestamp.unwrap_or_else(Utc::now),
        },
    };

    state.registry.broadcast(session_id, event).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_frame_parses() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type": "typing", "is_typing": true}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Typing { is_typing: true }));
    }

    #[test]
    fn message_frame_timestamp_is_optional() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type": "message", "content": "hi"}"#).unwrap();
        match frame {
            InboundFrame::Message { content, timestamp } => {
                assert_eq!(content, "hi");
                assert!(timestamp.is_none());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn unknown_frame_type_is_an_error() {
        assert!(serde_json::from_str::<InboundFrame>(r#"{"type": "dance"}"#).is_err());
    }
}
