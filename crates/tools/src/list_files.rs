//! Directory listing tool — a recursive, sorted listing as a JSON array.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tiller_core::error::ToolError;
use tiller_core::tool::Tool;

use crate::path::resolve_within;

#[derive(Debug, Default, Deserialize)]
struct ListFilesInput {
    #[serde(default)]
    path: Option<String>,
}

pub struct ListFilesTool {
    root: PathBuf,
}

impl ListFilesTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Every entry below `dir`, relative to it, `/`-separated; directories get a
/// trailing `/`.
async fn walk(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = Vec::new();
    let mut pending = vec![(dir.to_path_buf(), String::new())];

    while let Some((current, prefix)) = pending.pop() {
        let mut read_dir = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = format!("{prefix}{name}");
            if entry.file_type().await?.is_dir() {
                entries.push(format!("{relative}/"));
                pending.push((entry.path(), format!("{relative}/")));
            } else {
                entries.push(relative);
            }
        }
    }

    entries.sort();
    Ok(entries)
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories at a given path. If no path is provided, lists files in the current directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Optional relative path to list files from. Defaults to current directory if not provided."
                }
            }
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<String, ToolError> {
        let input: ListFilesInput = if input.is_null() {
            ListFilesInput::default()
        } else {
            serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments(e.to_string()))?
        };

        let relative = input
            .path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let dir = resolve_within(&self.root, &relative, self.name()).await?;

        let entries = walk(&dir).await.map_err(|e| ToolError::Io {
            path: relative,
            reason: e.to_string(),
        })?;

        tracing::debug!(dir = %dir.display(), entries = entries.len(), "Listed files");

        serde_json::to_string(&entries).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "list_files".into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("src/nested/mod.rs"), "").unwrap();
        dir
    }

    fn parse(output: &str) -> Vec<String> {
        serde_json::from_str(output).unwrap()
    }

    #[tokio::test]
    async fn lists_recursively_relative_and_sorted() {
        let dir = fixture();
        let tool = ListFilesTool::new(dir.path());

        let output = tool.execute(serde_json::json!({ "path": "." })).await.unwrap();
        assert_eq!(
            parse(&output),
            vec![
                "Cargo.toml",
                "src/",
                "src/main.rs",
                "src/nested/",
                "src/nested/mod.rs",
            ]
        );
    }

    #[tokio::test]
    async fn defaults_to_current_directory() {
        let dir = fixture();
        let tool = ListFilesTool::new(dir.path());

        let with_dot = tool.execute(serde_json::json!({ "path": "." })).await.unwrap();
        let without = tool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(with_dot, without);
        assert!(!parse(&without).iter().any(|p| p == "." || p == "./"));
    }

    #[tokio::test]
    async fn subdirectory_paths_are_relative_to_it() {
        let dir = fixture();
        let tool = ListFilesTool::new(dir.path());

        let output = tool.execute(serde_json::json!({ "path": "src" })).await.unwrap();
        assert_eq!(parse(&output), vec!["main.rs", "nested/", "nested/mod.rs"]);
    }

    #[tokio::test]
    async fn empty_directory_is_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListFilesTool::new(dir.path());
        let output = tool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(output, "[]");
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListFilesTool::new(dir.path());
        let err = tool
            .execute(serde_json::json!({ "path": "nope" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Io { .. }));
    }

    #[tokio::test]
    async fn parent_directory_is_refused() {
        let dir = fixture();
        let tool = ListFilesTool::new(dir.path().join("src"));
        let err = tool
            .execute(serde_json::json!({ "path": ".." }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn wrong_argument_type_is_invalid() {
        let tool = ListFilesTool::new(".");
        let err = tool.execute(serde_json::json!({ "path": 42 })).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
