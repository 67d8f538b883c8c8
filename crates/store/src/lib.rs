//! SQLite persistence for Parley.
//!
//! One pool backs all three store traits. Messages form an append-only
//! per-session log whose total order is `(created_at, iid)` — the
//! autoincrement column breaks same-millisecond ties.

pub mod sqlite;

pub use sqlite::SqliteStore;
