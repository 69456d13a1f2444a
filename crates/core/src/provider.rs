//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider takes the canonical transcript plus the tool catalog, speaks its
//! backend's wire protocol, and hands back exactly one assistant [`Turn`].
//!
//! Implementations: Anthropic Messages, OpenAI-compatible chat completions,
//! Ollama chat.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::message::Turn;

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Which provider and model an adapter is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Configured provider name (e.g., "anthropic", "local")
    pub provider: String,

    /// Model name as sent to the backend
    pub model: String,

    /// Optional alias accepted by `/switch`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
}

impl ModelInfo {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            short_name: None,
        }
    }

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = Some(short_name.into());
        self
    }

    /// Whether `name` refers to this model by full or short name.
    pub fn matches(&self, name: &str) -> bool {
        self.model == name || self.short_name.as_deref() == Some(name)
    }
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.short_name {
            Some(short) => write!(f, "{}/{} ({})", self.provider, self.model, short),
            None => write!(f, "{}/{}", self.provider, self.model),
        }
    }
}

/// The core Provider trait.
///
/// The conversation engine calls `run_inference()` without knowing which
/// backend is behind it. Implementations must not mutate the transcript and
/// must return [`ProviderError::Cancelled`] if `cancel` fires before the
/// backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The provider/model pair this adapter is bound to.
    fn model_info(&self) -> ModelInfo;

    /// Send the full transcript and tool catalog, returning one assistant turn.
    async fn run_inference(
        &self,
        cancel: &CancellationToken,
        tools: &[ToolDefinition],
        conversation: &[Turn],
    ) -> std::result::Result<Turn, ProviderError>;
}

/// Builds adapters by name, for startup and for `/switch`.
pub trait ProviderResolver: Send + Sync {
    /// Build a validated adapter for `model`, optionally pinned to `provider`.
    ///
    /// Without a provider name, the first provider listing the model (by name
    /// or short name) wins.
    fn resolve(
        &self,
        provider: Option<&str>,
        model: &str,
    ) -> std::result::Result<Arc<dyn Provider>, ProviderError>;

    /// Every configured provider/model pair.
    fn available_models(&self) -> Vec<ModelInfo>;
}
