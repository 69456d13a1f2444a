//! Ollama chat provider.
//!
//! Talks to a local daemon through the native `/api/chat` endpoint (not the
//! OpenAI shim) so that `num_ctx` can be set per model. Ollama does not issue
//! tool-call ids; they are synthesized, numbered after the tool uses already
//! in the transcript.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tiller_core::error::ProviderError;
use tiller_core::message::{ContentBlock, Turn};
use tiller_core::provider::{ModelInfo, ToolDefinition};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::call_id::CallIds;
use crate::http;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_CONTEXT_SIZE: u32 = 8096;
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// A model served by a local (or remote) Ollama daemon.
pub struct OllamaProvider {
    provider_name: String,
    model: String,
    short_name: Option<String>,
    base_url: String,
    system_prompt: String,
    context_size: u32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(model: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            provider_name: "ollama".into(),
            model: model.into(),
            short_name: None,
            base_url: DEFAULT_BASE_URL.into(),
            system_prompt: String::new(),
            context_size: DEFAULT_CONTEXT_SIZE,
            max_tokens: DEFAULT_MAX_TOKENS,
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

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

    pub fn with_context_size(mut self, context_size: u32) -> Self {
        self.context_size = context_size;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Convert the transcript to Ollama chat messages, one per block.
    ///
    /// Tool results carry the name of the tool that produced them, looked up
    /// from the tool use with the same id.
    fn to_api_messages(&self, conversation: &[Turn]) -> Vec<OllamaMessage> {
        let mut messages = Vec::new();
        let mut tool_names: HashMap<&str, &str> = HashMap::new();

        if !self.system_prompt.is_empty() {
            messages.push(OllamaMessage::text("system", &self.system_prompt));
        }

        for turn in conversation {
            for block in &turn.blocks {
                let message = match block {
                    ContentBlock::Text { text } => OllamaMessage::text(turn.role.as_str(), text),
                    ContentBlock::ToolUse { id, name, input } => {
                        tool_names.insert(id.as_str(), name.as_str());
                        OllamaMessage {
                            role: "assistant".into(),
                            content: String::new(),
                            tool_calls: vec![OllamaToolCall {
                                function: OllamaFunction {
                                    name: name.clone(),
                                    arguments: input.clone(),
                                },
                            }],
                            tool_name: None,
                        }
                    }
                    ContentBlock::ToolResult { id, result, .. } => OllamaMessage {
                        role: "tool".into(),
                        content: result.clone(),
                        tool_calls: Vec::new(),
                        tool_name: tool_names.get(id.as_str()).map(|n| n.to_string()),
                    },
                };
                messages.push(message);
            }
        }

        messages
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<OllamaTool> {
        tools
            .iter()
            .map(|t| OllamaTool {
                r#type: "function".into(),
                function: OllamaToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn parse_response(
        resp: OllamaResponse,
        prior: &[Turn],
    ) -> std::result::Result<Turn, ProviderError> {
        let mut blocks = Vec::new();
        let mut ids = CallIds::after(prior);

        if !resp.message.content.is_empty() {
            blocks.push(ContentBlock::Text {
                text: resp.message.content,
            });
        }

        for call in resp.message.tool_calls {
            let input = match call.function.arguments {
                serde_json::Value::Null => serde_json::json!({}),
                serde_json::Value::Object(map) => serde_json::Value::Object(map),
                other => {
                    return Err(ProviderError::MalformedResponse(format!(
                        "arguments for tool {:?} are not an object: {other}",
                        call.function.name
                    )));
                }
            };
            blocks.push(ContentBlock::ToolUse {
                id: ids.next_id(),
                name: call.function.name,
                input,
            });
        }

        Ok(Turn::assistant(blocks))
    }
}

#[async_trait]
impl tiller_core::Provider for OllamaProvider {
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
        let url = format!("{}/api/chat", self.base_url);

        let body = OllamaRequest {
            model: &self.model,
            messages: self.to_api_messages(conversation),
            tools: Self::to_api_tools(tools),
            stream: false,
            options: OllamaOptions {
                num_ctx: self.context_size,
                num_predict: self.max_tokens,
            },
        };

        debug!(
            provider = %self.provider_name,
            model = %self.model,
            messages = body.messages.len(),
            num_ctx = self.context_size,
            "Sending chat request"
        );

        let request = self.client.post(&url).json(&body);
        let api_response: OllamaResponse =
            http::send_json(cancel, request, &self.provider_name, &self.model).await?;
        trace!(done_reason = ?api_response.done_reason, "Ollama response received");

        Self::parse_response(api_response, conversation)
    }
}

// --- Ollama API types ---

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_ctx: u32,
    num_predict: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl OllamaMessage {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.into(),
            content: text.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    r#type: String,
    function: OllamaToolFunction,
}

#[derive(Debug, Serialize)]
struct OllamaToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    done_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tiller_core::Provider;

    fn provider() -> OllamaProvider {
        OllamaProvider::new("qwen3:8b", reqwest::Client::new())
            .with_provider_name("local")
            .with_system_prompt("Be brief.")
    }

    fn parse(resp: OllamaResponse) -> Result<Turn, ProviderError> {
        OllamaProvider::parse_response(resp, &[])
    }

    fn response(message: serde_json::Value) -> OllamaResponse {
        serde_json::from_value(json!({
            "model": "qwen3:8b",
            "created_at": "2025-01-01T00:00:00Z",
            "message": message,
            "done": true,
            "done_reason": "stop"
        }))
        .unwrap()
    }

    #[test]
    fn defaults() {
        let p = OllamaProvider::new("llama3.2", reqwest::Client::new());
        assert_eq!(p.base_url, "http://localhost:11434");
        assert_eq!(p.context_size, 8096);
        assert_eq!(p.model_info().model, "llama3.2");
    }

    #[test]
    fn tool_results_carry_tool_name() {
        let conversation = vec![
            Turn::user_text("list"),
            Turn::assistant(vec![
                ContentBlock::tool_use("tool_call_0", "list_files", json!({})),
                ContentBlock::tool_use("tool_call_1", "read_file", json!({"path": "a"})),
            ]),
            Turn::tool_results(vec![
                ContentBlock::tool_result("tool_call_0", "[\"a\"]", false),
                ContentBlock::tool_result("tool_call_1", "hi", false),
            ]),
        ];

        let msgs = provider().to_api_messages(&conversation);
        assert_eq!(msgs.len(), 6);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[2].tool_calls[0].function.arguments, json!({}));
        assert_eq!(msgs[3].tool_calls[0].function.arguments["path"], "a");
        assert_eq!(msgs[4].role, "tool");
        assert_eq!(msgs[4].tool_name.as_deref(), Some("list_files"));
        assert_eq!(msgs[5].tool_name.as_deref(), Some("read_file"));
        assert_eq!(msgs[5].content, "hi");
    }

    #[test]
    fn request_carries_options() {
        let p = provider().with_context_size(32768).with_max_tokens(512);
        let body = OllamaRequest {
            model: &p.model,
            messages: Vec::new(),
            tools: Vec::new(),
            stream: false,
            options: OllamaOptions {
                num_ctx: p.context_size,
                num_predict: p.max_tokens,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_ctx"], 32768);
        assert_eq!(json["options"]["num_predict"], 512);
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn parse_synthesizes_ids() {
        let turn = parse(response(json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [
                {"function": {"name": "list_files", "arguments": {}}},
                {"function": {"name": "read_file", "arguments": {"path": "b"}}}
            ]
        })))
        .unwrap();
        assert_eq!(turn.tool_use_ids(), vec!["tool_call_0", "tool_call_1"]);
        assert_eq!(turn.blocks.len(), 2);
    }

    #[test]
    fn ids_stay_unique_across_tool_rounds() {
        let call = || {
            response(json!({
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "list_files", "arguments": {}}}]
            }))
        };
        let first = parse(call()).unwrap();
        let mut transcript = vec![Turn::user_text("what's here?"), first.clone()];
        transcript.push(Turn::tool_results(vec![ContentBlock::tool_result(
            "tool_call_0",
            "[]",
            false,
        )]));

        let second = OllamaProvider::parse_response(call(), &transcript).unwrap();
        assert_eq!(first.tool_use_ids(), vec!["tool_call_0"]);
        assert_eq!(second.tool_use_ids(), vec!["tool_call_1"]);
    }

    #[test]
    fn non_object_arguments_are_malformed() {
        let err = parse(response(json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{"function": {"name": "read_file", "arguments": "path=b"}}]
        })))
        .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn parse_text() {
        let turn = parse(response(json!({
            "role": "assistant",
            "content": "Hi there"
        })))
        .unwrap();
        assert_eq!(turn.blocks, vec![ContentBlock::text("Hi there")]);
    }

    #[test]
    fn assistant_blocks_round_trip() {
        let original = Turn::assistant(vec![
            ContentBlock::text("Looking"),
            ContentBlock::tool_use("tool_call_0", "list_files", json!({"path": "src"})),
        ]);

        let msgs = OllamaProvider::new("m", reqwest::Client::new())
            .to_api_messages(std::slice::from_ref(&original));
        let content: String = msgs.iter().map(|m| m.content.as_str()).collect();
        let tool_calls: Vec<serde_json::Value> = msgs
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .map(|c| serde_json::to_value(c).unwrap())
            .collect();

        let parsed = parse(response(json!({
            "role": "assistant",
            "content": content,
            "tool_calls": tool_calls
        })))
        .unwrap();
        assert_eq!(parsed, original);
    }
}
