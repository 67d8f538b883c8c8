//! In-memory connection registry for real-time session peers.
//!
//! Tracks which live connections are attached to which session and fans
//! events out to them. Nothing here is durable: the registry is rebuilt
//! from nothing on restart, and losing presence state is accepted.

pub mod registry;

pub use registry::{ConnectionId, ConnectionRegistry};
