//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley conversation
//! server. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod completion;
pub mod error;
pub mod event;
pub mod message;
pub mod session;
pub mod store;
pub mod user;

// Re-export key types at crate root for ergonomics
pub use completion::{CompletionClient, CompletionRequest, Turn};
pub use error::{AuthError, ChatError, Error, ProviderError, Result, StoreError};
pub use event::{SessionEvent, SessionNotifier};
pub use message::{Message, MessagePair, MessageRole, MessageType, NewMessage};
pub use session::{NewSession, Session, SessionId, SessionMode, SessionStatus};
pub use store::{MessageStore, SessionStore, SortOrder, UserStore};
pub use user::{NewUser, User, UserId};
