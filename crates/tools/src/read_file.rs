//! File read tool — return the contents of a file in the working directory.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tiller_core::error::ToolError;
use tiller_core::tool::Tool;

use crate::path::resolve_within;

#[derive(Debug, Deserialize)]
struct ReadFileInput {
    path: String,
}

pub struct ReadFileTool {
    /// Directory relative paths are resolved against.
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a given relative file path. Use this when you want to see what's inside a file. Do not use this with directory names."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The relative path of a file in the working directory."
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<String, ToolError> {
        let input: ReadFileInput =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let full_path = resolve_within(&self.root, &input.path, self.name()).await?;
        tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|e| ToolError::Io {
                path: input.path,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition() {
        let tool = ReadFileTool::new(".");
        assert_eq!(tool.name(), "read_file");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["path"]));
        assert!(schema["properties"]["path"].is_object());
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.txt"), "Hello, world!\n").unwrap();

        let tool = ReadFileTool::new(dir.path());
        let output = tool
            .execute(serde_json::json!({ "path": "test.txt" }))
            .await
            .unwrap();
        assert_eq!(output, "Hello, world!\n");
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(dir.path());
        let err = tool
            .execute(serde_json::json!({ "path": "missing.txt" }))
            .await
            .unwrap_err();
        match err {
            ToolError::Io { path, .. } => assert_eq!(path, "missing.txt"),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let tool = ReadFileTool::new(dir.path());
        assert!(tool.execute(serde_json::json!({ "path": "sub" })).await.is_err());
    }

    #[tokio::test]
    async fn paths_outside_root_are_refused() {
        let parent = tempfile::tempdir().unwrap();
        std::fs::write(parent.path().join("secret.txt"), "hunter2").unwrap();
        let root = parent.path().join("project");
        std::fs::create_dir(&root).unwrap();
        let tool = ReadFileTool::new(&root);

        let absolute = parent.path().join("secret.txt").to_string_lossy().into_owned();
        for path in [absolute.as_str(), "../secret.txt"] {
            let err = tool.execute(serde_json::json!({ "path": path })).await.unwrap_err();
            assert!(matches!(err, ToolError::PermissionDenied { .. }), "{path}");
        }
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let tool = ReadFileTool::new(".");
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
