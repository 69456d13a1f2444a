//! In-memory backend: the index lives as long as the session.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tiller_core::error::IndexError;
use tiller_core::index::{FileIndex, IndexedFile};
use tokio::sync::RwLock;

/// An in-memory file index keyed by relative path.
pub struct InMemoryFileIndex {
    files: Arc<RwLock<HashMap<String, IndexedFile>>>,
}

impl InMemoryFileIndex {
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryFileIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileIndex for InMemoryFileIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn find_by_path(&self, path: &str) -> Result<Option<IndexedFile>, IndexError> {
        Ok(self.files.read().await.get(path).cloned())
    }

    async fn find_all(&self) -> Result<HashMap<String, IndexedFile>, IndexError> {
        Ok(self.files.read().await.clone())
    }

    async fn store(&self, file: IndexedFile) -> Result<(), IndexError> {
        self.files.write().await.insert(file.path.clone(), file);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool, IndexError> {
        Ok(self.files.write().await.remove(path).is_some())
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.files.read().await.len())
    }
}
