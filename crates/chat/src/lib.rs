//! Prompt assembly and the chat send pipeline.
//!
//! `prompt` is pure: a deterministic mapping from (session, history window,
//! new text) to model input. `ChatPipeline` owns the orchestration — it is
//! the only place where authorization, persistence, completion, and
//! realtime notification meet.

pub mod pipeline;
pub mod prompt;

pub use pipeline::ChatPipeline;
pub use prompt::{HISTORY_WINDOW, Prompt, assemble, system_prompt};
