//! Completion provider implementations and the degradation policy.
//!
//! `AnthropicClient` implements `parley_core::CompletionClient` honestly —
//! errors are errors. `CompletionService` sits above any client and decides
//! what a failure means for a send: substitute the fallback reply (default)
//! or surface the error (strict mode).

pub mod anthropic;
pub mod service;

pub use anthropic::AnthropicClient;
pub use service::{CompletionOutcome, CompletionService, FALLBACK_REPLY};
