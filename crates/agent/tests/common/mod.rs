//! Scripted providers shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tiller_core::error::ProviderError;
use tiller_core::event::DisplayEvent;
use tiller_core::message::{ContentBlock, Turn};
use tiller_core::provider::{ModelInfo, Provider, ProviderResolver, ToolDefinition};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Returns scripted responses in order and records every request.
pub struct ScriptedProvider {
    info: ModelInfo,
    responses: Mutex<VecDeque<Result<Turn, ProviderError>>>,
    requests: Mutex<Vec<(Vec<String>, Vec<Turn>)>>,
}

impl ScriptedProvider {
    pub fn new(info: ModelInfo, responses: Vec<Result<Turn, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            info,
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn mock(responses: Vec<Result<Turn, ProviderError>>) -> Arc<Self> {
        Self::new(ModelInfo::new("mock", "mock-model"), responses)
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Tool names offered on call `n`.
    pub fn tools_offered(&self, n: usize) -> Vec<String> {
        self.requests.lock().unwrap()[n].0.clone()
    }

    /// Transcript sent on call `n`.
    pub fn transcript(&self, n: usize) -> Vec<Turn> {
        self.requests.lock().unwrap()[n].1.clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn model_info(&self) -> ModelInfo {
        self.info.clone()
    }

    async fn run_inference(
        &self,
        _cancel: &CancellationToken,
        tools: &[ToolDefinition],
        conversation: &[Turn],
    ) -> Result<Turn, ProviderError> {
        self.requests.lock().unwrap().push((
            tools.iter().map(|t| t.name.clone()).collect(),
            conversation.to_vec(),
        ));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Turn::assistant(vec![ContentBlock::text("done")])))
    }
}

/// Resolves only the providers it was given.
pub struct FixedResolver(pub Vec<Arc<ScriptedProvider>>);

impl ProviderResolver for FixedResolver {
    fn resolve(&self, provider: Option<&str>, model: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        self.0
            .iter()
            .find(|p| {
                let info = p.model_info();
                info.matches(model) && provider.is_none_or(|name| info.provider == name)
            })
            .map(|p| Arc::clone(p) as Arc<dyn Provider>)
            .ok_or_else(|| ProviderError::UnknownModel {
                provider: provider.unwrap_or_default().to_string(),
                model: model.to_string(),
            })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        self.0.iter().map(|p| p.model_info()).collect()
    }
}

pub fn text(answer: &str) -> Result<Turn, ProviderError> {
    Ok(Turn::assistant(vec![ContentBlock::text(answer)]))
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<DisplayEvent>) -> Vec<DisplayEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
