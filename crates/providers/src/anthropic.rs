//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly (not an OpenAI-compatible proxy).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as a top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tiller_core::error::ProviderError;
use tiller_core::message::{ContentBlock, Role, Turn};
use tiller_core::provider::{ModelInfo, ToolDefinition};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::call_id::CallIds;
use crate::http;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    provider_name: String,
    model: String,
    short_name: Option<String>,
    base_url: String,
    api_key: String,
    system_prompt: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider bound to `model`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            provider_name: "anthropic".into(),
            model: model.into(),
            short_name: None,
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            system_prompt: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Name reported in `model_info()` (the configured provider name).
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    pub fn with_short_name(mut self, short_name: Option<String>) -> Self {
        self.short_name = short_name;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Convert the transcript to Anthropic messages, one message per block.
    ///
    /// Tool results travel as user-role `tool_result` blocks.
    fn to_api_messages(conversation: &[Turn]) -> Vec<AnthropicMessage> {
        let mut result = Vec::new();

        for turn in conversation {
            for block in &turn.blocks {
                let (role, api_block) = match block {
                    ContentBlock::Text { text } if text.is_empty() => continue,
                    ContentBlock::Text { text } => (
                        turn.role.as_str(),
                        ApiBlock::Text { text: text.clone() },
                    ),
                    ContentBlock::ToolUse { id, name, input } => (
                        Role::Assistant.as_str(),
                        ApiBlock::ToolUse {
                            id: id.clone(),
                            name: name.clone(),
                            input: input.clone(),
                        },
                    ),
                    ContentBlock::ToolResult { id, result, is_error } => (
                        Role::User.as_str(),
                        ApiBlock::ToolResult {
                            tool_use_id: id.clone(),
                            content: result.clone(),
                            is_error: *is_error,
                        },
                    ),
                };
                result.push(AnthropicMessage {
                    role: role.to_string(),
                    content: vec![api_block],
                });
            }
        }

        result
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    /// Convert the Anthropic reply into one assistant turn, keeping block order.
    /// Empty text blocks are dropped; the API refuses them when replayed.
    fn parse_response(
        resp: AnthropicResponse,
        prior: &[Turn],
    ) -> std::result::Result<Turn, ProviderError> {
        let mut blocks = Vec::with_capacity(resp.content.len());
        let mut ids = CallIds::after(prior);

        for (index, item) in resp.content.into_iter().enumerate() {
            let kind = item
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("<missing>")
                .to_string();

            let block = serde_json::from_value::<ApiBlock>(item).map_err(|e| {
                ProviderError::MalformedResponse(format!("Anthropic content block {index}: {e}"))
            })?;

            match block {
                ApiBlock::Text { text } if text.is_empty() => {}
                ApiBlock::Text { text } => blocks.push(ContentBlock::Text { text }),
                ApiBlock::ToolUse { id, name, input } => {
                    let id = if id.is_empty() {
                        ids.next_id()
                    } else {
                        id
                    };
                    let input = if input.is_null() {
                        serde_json::json!({})
                    } else {
                        input
                    };
                    blocks.push(ContentBlock::ToolUse { id, name, input });
                }
                ApiBlock::ToolResult { .. } | ApiBlock::Other => {
                    return Err(ProviderError::UnsupportedContent(format!(
                        "Anthropic content type {kind:?}"
                    )));
                }
            }
        }

        Ok(Turn::assistant(blocks))
    }
}

#[async_trait]
impl tiller_core::Provider for AnthropicProvider {
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: self.provider_name.clone(),
            model: self.model.clone(),
            short_name: self.short_name.clone(),
        }
    }

    async fn run_inference(
        &self,
        cancel: &CancellationToken,
        tools: &[ToolDefinition],
        conversation: &[Turn],
    ) -> std::result::Result<Turn, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);

        let system = if self.system_prompt.is_empty() {
            Vec::new()
        } else {
            vec![ApiBlock::Text {
                text: self.system_prompt.clone(),
            }]
        };

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: Self::to_api_messages(conversation),
            tools: Self::to_api_tools(tools),
        };

        debug!(
            provider = %self.provider_name,
            model = %self.model,
            messages = body.messages.len(),
            tools = tools.len(),
            "Sending completion request"
        );

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let api_resp: AnthropicResponse =
            http::send_json(cancel, request, &self.provider_name, &self.model).await?;
        trace!(stop_reason = ?api_resp.stop_reason, blocks = api_resp.content.len(), "Anthropic response received");

        Self::parse_response(api_resp, conversation)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<ApiBlock>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ApiBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ApiBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<serde_json::Value>,
    #[serde(default)]
    stop_reason: Option<String>,
}
