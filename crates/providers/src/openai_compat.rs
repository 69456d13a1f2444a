//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, vLLM, LM Studio, llama.cpp server, and any
//! endpoint exposing `/chat/completions` with function calling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tiller_core::error::ProviderError;
use tiller_core::message::{ContentBlock, Turn};
use tiller_core::provider::{ModelInfo, ToolDefinition};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::call_id::CallIds;
use crate::http;

const DEFAULT_MAX_TOKENS: u32 = 2048;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    provider_name: String,
    model: String,
    short_name: Option<String>,
    base_url: String,
    api_key: Option<String>,
    system_prompt: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// Without an API key no `Authorization` header is sent.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            provider_name: name.into(),
            model: model.into(),
            short_name: None,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            system_prompt: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>, client: reqwest::Client) -> Self {
        Self::new("openai", "https://api.openai.com/v1", Some(api_key.into()), model, client)
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

    /// Convert the transcript to chat messages, one message per block.
    ///
    /// The system prompt leads; tool uses become single-call assistant
    /// messages; tool results become `tool` messages.
    fn to_api_messages(&self, conversation: &[Turn]) -> Vec<ApiMessage> {
        let mut messages = Vec::new();

        if !self.system_prompt.is_empty() {
            messages.push(ApiMessage::text("system", &self.system_prompt));
        }

        for turn in conversation {
            for block in &turn.blocks {
                let message = match block {
                    ContentBlock::Text { text } => ApiMessage::text(turn.role.as_str(), text),
                    ContentBlock::ToolUse { id, name, input } => ApiMessage {
                        role: "assistant".into(),
                        content: None,
                        tool_calls: Some(vec![ApiToolCall {
                            id: id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: name.clone(),
                                arguments: input.to_string(),
                            },
                        }]),
                        tool_call_id: None,
                    },
                    ContentBlock::ToolResult { id, result, .. } => ApiMessage {
                        role: "tool".into(),
                        content: Some(result.clone()),
                        tool_calls: None,
                        tool_call_id: Some(id.clone()),
                    },
                };
                messages.push(message);
            }
        }

        messages
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Convert the first choice into one assistant turn: text first, then the
    /// tool calls in list order.
    fn parse_response(
        resp: ApiResponse,
        prior: &[Turn],
    ) -> std::result::Result<Turn, ProviderError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        let mut blocks = Vec::new();
        let mut ids = CallIds::after(prior);

        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            blocks.push(ContentBlock::Text { text });
        }

        for call in choice.message.tool_calls.unwrap_or_default() {
            if call.r#type != "function" {
                return Err(ProviderError::UnsupportedContent(format!(
                    "tool call type {:?}",
                    call.r#type
                )));
            }

            let id = call
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| ids.next_id());
            let input = parse_arguments(&call.function.name, call.function.arguments)?;

            blocks.push(ContentBlock::ToolUse {
                id,
                name: call.function.name,
                input,
            });
        }

        Ok(Turn::assistant(blocks))
    }
}

/// Arguments arrive as a JSON-encoded string; some servers send the object
/// itself.
fn parse_arguments(
    tool: &str,
    arguments: serde_json::Value,
) -> std::result::Result<serde_json::Value, ProviderError> {
    match arguments {
        serde_json::Value::Null => Ok(serde_json::json!({})),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(serde_json::json!({})),
        serde_json::Value::String(s) => serde_json::from_str(&s).map_err(|e| {
            ProviderError::MalformedResponse(format!("invalid arguments for tool {tool:?}: {e}"))
        }),
        other => Ok(other),
    }
}

#[async_trait]
impl tiller_core::Provider for OpenAiCompatProvider {
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
        let url = format!("{}/chat/completions", self.base_url);

        let body = ApiRequest {
            model: &self.model,
            messages: self.to_api_messages(conversation),
            max_tokens: self.max_tokens,
            stream: false,
            tools: Self::to_api_tools(tools),
        };

        debug!(
            provider = %self.provider_name,
            model = %self.model,
            messages = body.messages.len(),
            tools = tools.len(),
            "Sending completion request"
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let api_response: ApiResponse =
            http::send_json(cancel, request, &self.provider_name, &self.model).await?;
        trace!(choices = api_response.choices.len(), "Chat completion received");

        Self::parse_response(api_response, conversation)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiToolDefinition>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(default = "function_type")]
    r#type: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

fn function_type() -> String {
    "function".into()
}
