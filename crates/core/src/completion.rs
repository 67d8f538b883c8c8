//! Completion client trait — the abstraction over the text-generation
//! provider.
//!
//! A client knows how to send one assembled prompt (system instruction plus
//! turn sequence) to an external model and return the generated text. The
//! fallback-on-failure policy lives above this trait, in the provider
//! crate's `CompletionService`, so clients stay honest about errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, MessageRole};

/// One turn of model input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: MessageRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for Turn {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g. "claude-3-5-sonnet-20241022")
    pub model: String,

    /// System instruction, sent out-of-band from the turns
    pub system: String,

    /// The bounded conversation window, oldest first, new user turn last
    pub turns: Vec<Turn>,

    /// Output token budget
    pub max_tokens: u32,
}

/// A synchronous (non-streaming) text-generation client.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Provider name, for logging.
    fn name(&self) -> &str;

    /// Generate a reply for the given prompt. Errors are real errors here;
    /// graceful degradation is the caller's policy decision.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}
