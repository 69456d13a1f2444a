//! Built-in tool implementations for Tiller.
//!
//! Tools let the model inspect the user's working directory: read a file,
//! list a directory tree, and fetch the indexed summary of a file.

pub mod file_summary;
pub mod list_files;
mod path;
pub mod read_file;

use std::path::PathBuf;
use std::sync::Arc;

use tiller_core::index::FileIndex;
use tiller_core::tool::ToolRegistry;

pub use file_summary::FileSummaryTool;
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;

/// Create the default tool registry for a session rooted at `root`.
pub fn default_registry(root: impl Into<PathBuf>, index: Arc<dyn FileIndex>) -> ToolRegistry {
    let root = root.into();
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ReadFileTool::new(root.clone())));
    registry.register(Box::new(ListFilesTool::new(root)));
    registry.register(Box::new(FileSummaryTool::new(index)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiller_index::InMemoryFileIndex;

    #[test]
    fn default_registry_has_all_tools() {
        let registry = default_registry(".", Arc::new(InMemoryFileIndex::new()));
        assert_eq!(registry.names(), vec!["file_summary", "list_files", "read_file"]);
        for def in registry.definitions() {
            assert_eq!(def.parameters["type"], "object");
            assert!(!def.description.is_empty());
        }
    }
}
