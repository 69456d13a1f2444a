//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what let the model look at the user's workspace: read a file,
//! list a directory, fetch an indexed summary.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::ContentBlock;
use crate::provider::ToolDefinition;

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in the [`ToolRegistry`],
/// which makes it available to the conversation engine.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input object.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given input, producing the result text.
    async fn execute(&self, input: serde_json::Value) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The catalog of tools offered to the model.
///
/// Tools are keyed by name; definitions come out in name order so every
/// request declares the catalog identically.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call by name.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(input).await
    }

    /// Run the tool use `id` and turn its outcome into a result block.
    ///
    /// Never fails: an unknown tool or a tool error becomes an error-flagged
    /// result that the model gets to see.
    pub async fn dispatch(&self, id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
        if !self.tools.contains_key(name) {
            warn!(tool = %name, "Model requested an unknown tool");
            return ContentBlock::tool_result(id, "tool not found", true);
        }

        match self.execute(name, input).await {
            Ok(output) => {
                debug!(tool = %name, bytes = output.len(), "Tool succeeded");
                ContentBlock::tool_result(id, output, false)
            }
            Err(e) => {
                debug!(tool = %name, error = %e, "Tool failed");
                ContentBlock::tool_result(id, e.to_string(), true)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            input: serde_json::Value,
        ) -> std::result::Result<String, ToolError> {
            input["text"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidArguments("missing text".into()))
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "noop"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _: serde_json::Value) -> std::result::Result<String, ToolError> {
            Ok(String::new())
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_definitions_are_name_ordered() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(NamedTool("zeta")));
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(NamedTool("alpha")));

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "echo", "zeta"]);
        assert_eq!(registry.names(), vec!["alpha", "echo", "zeta"]);
    }

    #[tokio::test]
    async fn dispatch_success() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let block = registry
            .dispatch("call_1", "echo", serde_json::json!({"text": "hello world"}))
            .await;
        assert_eq!(block, ContentBlock::tool_result("call_1", "hello world", false));
    }

    #[tokio::test]
    async fn dispatch_missing_tool() {
        let registry = ToolRegistry::new();
        let block = registry
            .dispatch("call_1", "nonexistent", serde_json::json!({}))
            .await;
        assert_eq!(block, ContentBlock::tool_result("call_1", "tool not found", true));
    }

    #[tokio::test]
    async fn dispatch_tool_error_is_flagged() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let block = registry.dispatch("call_2", "echo", serde_json::json!({})).await;
        match block {
            ContentBlock::ToolResult { id, result, is_error } => {
                assert_eq!(id, "call_2");
                assert!(is_error);
                assert!(result.contains("missing text"));
            }
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn execute_missing_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("nonexistent", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
