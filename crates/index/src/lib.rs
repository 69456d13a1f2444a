//! File index implementations for Tiller.
//!
//! The index maps workspace-relative paths to model-written summaries. It is
//! filled by [`Indexer::refresh`] and read by the `file_summary` tool. The
//! SQLite backend keeps it across runs; the in-memory one lasts a session.

pub mod in_memory;
pub mod refresh;
pub mod sqlite;

pub use in_memory::InMemoryFileIndex;
pub use refresh::{Indexer, RefreshOutcome};
pub use sqlite::SqliteFileIndex;
