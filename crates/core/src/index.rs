//! File index trait — summaries of workspace files keyed by relative path.
//!
//! The index is what `file_summary` reads from and what the refresh pass
//! writes to. Implementations live in `tiller-index`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// One indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    /// Path relative to the indexed root, `/`-separated
    pub path: String,

    /// SHA-256 of the file contents, lowercase hex
    pub hash: String,

    /// When this entry was last (re)summarized
    pub updated: DateTime<Utc>,

    /// Model-generated summary
    pub summary: String,
}

impl IndexedFile {
    pub fn new(path: impl Into<String>, hash: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            updated: Utc::now(),
            summary: summary.into(),
        }
    }
}

/// Storage for indexed files.
#[async_trait]
pub trait FileIndex: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Look up one file by path.
    async fn find_by_path(&self, path: &str) -> std::result::Result<Option<IndexedFile>, IndexError>;

    /// Every indexed file, keyed by path.
    async fn find_all(&self) -> std::result::Result<HashMap<String, IndexedFile>, IndexError>;

    /// Insert or replace the entry for `file.path`.
    async fn store(&self, file: IndexedFile) -> std::result::Result<(), IndexError>;

    /// Remove an entry. Returns true if it existed.
    async fn delete(&self, path: &str) -> std::result::Result<bool, IndexError>;

    /// Number of indexed files.
    async fn count(&self) -> std::result::Result<usize, IndexError> {
        Ok(self.find_all().await?.len())
    }
}
