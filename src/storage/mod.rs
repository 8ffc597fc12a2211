//! Storage backends
//!
//! Dual storage over one SQLite file:
//! - libsql for the append-only chat history (local file or remote)
//! - rusqlite with the sqlite-vec extension for vector search
//!
//! Both collaborators are process-scoped: opened at startup, dropped at
//! shutdown.

pub mod history;
pub mod vectors;

pub use history::{ConnectionMode, HistoryStore, LibsqlHistory};
pub use vectors::{VectorMatch, VectorRecord, VectorStore};
