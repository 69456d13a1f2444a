//! Provider resolver — builds adapters from the configured provider list.
//!
//! Used once at startup and again on every `/switch`. Resolution validates
//! the provider/model pair and credentials before anything is handed to the
//! engine, so a failed switch never disturbs the active adapter.

use std::sync::Arc;

use tiller_config::{AppConfig, ModelConfig, ProviderConfig, ProviderKind};
use tiller_core::error::ProviderError;
use tiller_core::provider::{ModelInfo, Provider, ProviderResolver};
use tracing::info;

use crate::anthropic::AnthropicProvider;
use crate::http;
use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Resolves provider/model names against an [`AppConfig`].
pub struct ConfigResolver {
    config: AppConfig,
    client: reqwest::Client,
}

impl ConfigResolver {
    /// Create a resolver. All adapters share one HTTP client configured with
    /// `request_timeout_secs`.
    pub fn new(config: AppConfig) -> Result<Self, ProviderError> {
        let client = http::build_client(config.request_timeout_secs)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build the adapter for the configured startup selection.
    pub fn resolve_default(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        let (provider, model) = self
            .config
            .default_selection()
            .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;
        self.resolve(Some(&provider), &model)
    }

    fn build(
        &self,
        provider: &ProviderConfig,
        model: &ModelConfig,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        let client = self.client.clone();
        let system_prompt = self.config.system_prompt.as_str();
        let max_tokens = self.config.max_tokens;

        let adapter: Arc<dyn Provider> = match provider.kind {
            ProviderKind::Claude => {
                let api_key = provider
                    .require_api_key()
                    .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;
                Arc::new(
                    AnthropicProvider::new(api_key, &model.name, client)
                        .with_base_url(provider.base_url())
                        .with_provider_name(&provider.name)
                        .with_short_name(model.short_name.clone())
                        .with_system_prompt(system_prompt)
                        .with_max_tokens(max_tokens),
                )
            }
            ProviderKind::OpenAi => Arc::new(
                OpenAiCompatProvider::new(
                    &provider.name,
                    provider.base_url(),
                    provider.api_key.clone(),
                    &model.name,
                    client,
                )
                .with_short_name(model.short_name.clone())
                .with_system_prompt(system_prompt)
                .with_max_tokens(max_tokens),
            ),
            ProviderKind::Ollama => Arc::new(
                OllamaProvider::new(&model.name, client)
                    .with_base_url(provider.base_url())
                    .with_provider_name(&provider.name)
                    .with_short_name(model.short_name.clone())
                    .with_system_prompt(system_prompt)
                    .with_context_size(model.context_size)
                    .with_max_tokens(max_tokens),
            ),
        };

        info!(
            provider = %provider.name,
            kind = provider.kind.as_str(),
            model = %model.name,
            "Resolved provider adapter"
        );
        Ok(adapter)
    }
}

impl ProviderResolver for ConfigResolver {
    fn resolve(
        &self,
        provider: Option<&str>,
        model: &str,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        let provider_config = match provider {
            Some(name) => self
                .config
                .provider(name)
                .ok_or_else(|| ProviderError::NotConfigured(format!("no provider named {name:?}")))?,
            None => self.config.provider_by_model_name(model).ok_or_else(|| {
                ProviderError::UnknownModel {
                    provider: self
                        .config
                        .providers
                        .iter()
                        .map(|p| p.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    model: model.to_string(),
                }
            })?,
        };

        let model_config =
            provider_config
                .model(model)
                .ok_or_else(|| ProviderError::UnknownModel {
                    provider: provider_config.name.clone(),
                    model: model.to_string(),
                })?;

        self.build(provider_config, model_config)
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        self.config
            .providers
            .iter()
            .flat_map(|p| {
                p.models.iter().map(|m| ModelInfo {
                    provider: p.name.clone(),
                    model: m.name.clone(),
                    short_name: m.short_name.clone(),
                })
            })
            .collect()
    }
}
