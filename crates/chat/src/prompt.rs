//! Prompt assembly — a pure function of session, history, and new text.
//!
//! The bounded history window is the only conversation memory given to the
//! model: no summarization, no retrieval. Identical inputs always produce
//! identical output; nothing here does I/O or reads the clock.

use parley_core::completion::Turn;
use parley_core::message::Message;
use parley_core::session::{Session, SessionMode};

/// Maximum number of persisted turns included as model context.
pub const HISTORY_WINDOW: usize = 10;

/// Persona used when the session has no role set.
const DEFAULT_ROLE: &str = "AI Assistant";

/// An assembled model input.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub turns: Vec<Turn>,
}

/// The per-mode behavioral directive appended to the base prompt.
fn mode_directive(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::Chat => {
            "Engage in friendly conversation and help the user with their questions. \
             Be conversational and approachable."
        }
        SessionMode::Question => {
            "Help the user answer specific questions. Provide clear, concise explanations. \
             Ask clarifying questions if needed."
        }
        SessionMode::Teaching => {
            "Act as a teacher/mentor. Explain concepts clearly, provide examples, and help \
             the user understand the material. Encourage learning and ask probing questions."
        }
        SessionMode::Review => {
            "Review the user's work constructively. Point out strengths, areas for \
             improvement, and provide specific suggestions. Be encouraging but honest."
        }
    }
}

/// Derive the system instruction from a session's persona and mode.
pub fn system_prompt(role: Option<&str>, mode: SessionMode) -> String {
    let role = match role {
        Some(r) if !r.trim().is_empty() => r,
        _ => DEFAULT_ROLE,
    };
    format!(
        "You are {role}. Be helpful, respectful, and educational. {}",
        mode_directive(mode)
    )
}

/// Build the model input for one send: at most the `HISTORY_WINDOW` most
/// recent persisted turns (oldest first), with the new user turn appended
/// as the final element.
pub fn assemble(session: &Session, history: &[Message], new_user_text: &str) -> Prompt {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut turns: Vec<Turn> = history[start..].iter().map(Turn::from).collect();
    turns.push(Turn::user(new_user_text));

    Prompt {
        system: system_prompt(session.role.as_deref(), session.mode),
        turns,
    }
}
