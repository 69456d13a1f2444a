//! File summary tool — look up the indexed summary of a file.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tiller_core::error::ToolError;
use tiller_core::index::FileIndex;
use tiller_core::tool::Tool;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct FileSummaryInput {
    path: String,
}

pub struct FileSummaryTool {
    index: Arc<dyn FileIndex>,
}

impl FileSummaryTool {
    pub fn new(index: Arc<dyn FileIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for FileSummaryTool {
    fn name(&self) -> &str {
        "file_summary"
    }

    fn description(&self) -> &str {
        "Fetch a summary of the file contents. Use this if you want to understand on a high level what the content of a file is, but don't need any specific details yet. Do not use this with directory names."
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

    /// An unindexed path (or an index failure) yields an empty summary.
    async fn execute(&self, input: serde_json::Value) -> Result<String, ToolError> {
        let input: FileSummaryInput =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        match self.index.find_by_path(&input.path).await {
            Ok(Some(file)) => Ok(file.summary),
            Ok(None) => Ok(String::new()),
            Err(e) => {
                debug!(path = %input.path, error = %e, "Summary lookup failed");
                Ok(String::new())
            }
        }
    }
}
