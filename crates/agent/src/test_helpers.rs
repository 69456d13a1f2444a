//! Shared test helpers for engine and command tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use tiller_core::error::ProviderError;
use tiller_core::event::DisplayEvent;
use tiller_core::message::{ContentBlock, Turn};
use tiller_core::provider::{ModelInfo, Provider, ProviderResolver, ToolDefinition};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `run_inference` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    info: ModelInfo,
    responses: Mutex<VecDeque<Result<Turn, ProviderError>>>,
    transcripts: Mutex<Vec<Vec<Turn>>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<Turn, ProviderError>>) -> Self {
        Self::named(ModelInfo::new("mock", "mock-model"), responses)
    }

    pub fn named(info: ModelInfo, responses: Vec<Result<Turn, ProviderError>>) -> Self {
        Self {
            info,
            responses: Mutex::new(responses.into()),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// One plain text answer per call.
    pub fn texts(answers: &[&str]) -> Self {
        Self::new(
            answers
                .iter()
                .map(|a| Ok(Turn::assistant(vec![ContentBlock::text(*a)])))
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        self.transcripts.lock().unwrap().len()
    }

    /// The transcript passed to each call so far.
    pub fn transcripts(&self) -> Vec<Vec<Turn>> {
        self.transcripts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn model_info(&self) -> ModelInfo {
        self.info.clone()
    }

    async fn run_inference(
        &self,
        _cancel: &CancellationToken,
        _tools: &[ToolDefinition],
        conversation: &[Turn],
    ) -> Result<Turn, ProviderError> {
        self.transcripts.lock().unwrap().push(conversation.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("SequentialMockProvider: no more responses"))
    }
}

/// Resolves against a fixed set of mock providers.
pub struct StaticResolver {
    providers: Vec<Arc<SequentialMockProvider>>,
}

impl StaticResolver {
    pub fn new(providers: Vec<Arc<SequentialMockProvider>>) -> Self {
        Self { providers }
    }
}

impl ProviderResolver for StaticResolver {
    fn resolve(&self, provider: Option<&str>, model: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        self.providers
            .iter()
            .find(|p| {
                let info = p.model_info();
                info.matches(model) && provider.is_none_or(|name| info.provider == name)
            })
            .map(|p| Arc::clone(p) as Arc<dyn Provider>)
            .ok_or_else(|| ProviderError::UnknownModel {
                provider: provider.unwrap_or("mock").to_string(),
                model: model.to_string(),
            })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        self.providers.iter().map(|p| p.model_info()).collect()
    }
}

/// An assistant turn made only of the given tool uses.
pub fn tool_use_turn(uses: &[(&str, &str, serde_json::Value)]) -> Turn {
    Turn::assistant(
        uses.iter()
            .map(|(id, name, input)| ContentBlock::tool_use(*id, *name, input.clone()))
            .collect(),
    )
}

/// Everything emitted so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<DisplayEvent>) -> Vec<DisplayEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
