//! Configuration loading, validation, and management for Tiller.
//!
//! Loads configuration from `~/.config/tiller/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.config/tiller/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider to start with (defaults to the one holding the default model)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,

    /// Model to start with (full or short name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// System prompt given to every provider adapter
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Shell command that receives `/copy` output on stdin (e.g. "wl-copy")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clipboard_command: Option<String>,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout for provider calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Cap on consecutive tool rounds answering one human message
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Where file summaries are kept
    #[serde(default)]
    pub index: IndexConfig,

    /// Configured backends, in lookup order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// File index storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// "sqlite" (kept across runs) or "in_memory" (dropped on exit)
    #[serde(default = "default_index_backend")]
    pub backend: String,

    /// SQLite database file; relative paths resolve against the working directory
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

fn default_index_backend() -> String {
    "sqlite".into()
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".tiller").join("index.db")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            path: default_index_path(),
        }
    }
}

impl IndexConfig {
    /// The database file for a session rooted at `root`.
    pub fn resolve_path(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. Be concise and accurate in your responses.".into()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_max_tool_rounds() -> usize {
    25
}
fn default_context_size() -> u32 {
    8096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

/// The wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Messages API
    Claude,
    /// Any OpenAI-compatible chat-completions endpoint
    #[serde(rename = "openai")]
    OpenAi,
    /// A local Ollama daemon
    Ollama,
}

impl ProviderKind {
    /// Base URL used when a provider does not set one.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "https://api.anthropic.com",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

/// One configured backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name used by `/switch` and in status output
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ProviderKind,

    /// Overrides [`ProviderKind::default_base_url`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Resolved from `api_key_env`; never written to disk
    #[serde(skip)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key_env", &self.api_key_env)
            .field("api_key", &redact(&self.api_key))
            .field("models", &self.models)
            .finish()
    }
}

impl ProviderConfig {
    /// Find a model by full or short name.
    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models
            .iter()
            .find(|m| m.name == name || m.short_name.as_deref() == Some(name))
    }

    /// The model flagged as default, or the first one.
    pub fn default_model(&self) -> Option<&ModelConfig> {
        self.models
            .iter()
            .find(|m| m.default)
            .or_else(|| self.models.first())
    }

    /// Effective base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
            .trim_end_matches('/')
    }

    /// The resolved API key, or an error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or_else(|| ConfigError::MissingCredential {
            provider: self.name.clone(),
            env: self
                .api_key_env
                .clone()
                .unwrap_or_else(|| "<api_key_env not set>".into()),
        })
    }
}

/// One model offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,

    /// At most one model across all providers may set this
    #[serde(default)]
    pub default: bool,

    /// Context window, passed to Ollama as `num_ctx`
    #[serde(default = "default_context_size")]
    pub context_size: u32,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_name: None,
            default: false,
            context_size: default_context_size(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.config/tiller/config.toml).
    ///
    /// Also checks environment variables:
    /// - `TILLER_PROVIDER` / `TILLER_MODEL` override the startup selection
    /// - each provider's `api_key_env` supplies its API key
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Load from `path`, then apply environment overrides and credentials.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        let lookup = |name: &str| std::env::var(name).ok();
        config.apply_env_overrides_with(lookup);
        config.resolve_credentials_with(lookup);
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TILLER_PROVIDER` / `TILLER_MODEL` using the given lookup.
    pub fn apply_env_overrides_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("TILLER_PROVIDER").filter(|v| !v.is_empty()) {
            self.default_provider = Some(provider);
        }
        if let Some(model) = lookup("TILLER_MODEL").filter(|v| !v.is_empty()) {
            self.default_model = Some(model);
        }
    }

    /// Fill each provider's `api_key` from its `api_key_env` variable.
    pub fn resolve_credentials_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for provider in &mut self.providers {
            if let Some(env) = &provider.api_key_env {
                provider.api_key = lookup(env).filter(|v| !v.is_empty());
                if provider.api_key.is_none() {
                    tracing::debug!(provider = %provider.name, env = %env, "No API key in environment");
                }
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".config").join("tiller")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::ValidationError("no providers configured".into()));
        }

        let mut names = HashSet::new();
        let mut default_count = 0;
        for provider in &self.providers {
            if !names.insert(provider.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "provider name {:?} is used more than once",
                    provider.name
                )));
            }
            if provider.models.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "provider {:?} has no models configured",
                    provider.name
                )));
            }
            default_count += provider.models.iter().filter(|m| m.default).count();
        }

        if default_count > 1 {
            return Err(ConfigError::ValidationError(
                "multiple models configured as default".into(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError("max_tokens must be > 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }
        if self.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError("max_tool_rounds must be > 0".into()));
        }
        if !matches!(self.index.backend.as_str(), "sqlite" | "in_memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown index backend {:?} (expected \"sqlite\" or \"in_memory\")",
                self.index.backend
            )));
        }

        Ok(())
    }

    /// Find a provider by name.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// The first provider listing `model` by full or short name.
    pub fn provider_by_model_name(&self, model: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.model(model).is_some())
    }

    /// The provider/model pair to start a session with, as
    /// `(provider name, model name)`.
    ///
    /// Order of preference: explicit `default_provider`/`default_model`, the
    /// model flagged `default`, then the first model of the first provider.
    pub fn default_selection(&self) -> Result<(String, String), ConfigError> {
        let pick = |p: &ProviderConfig, m: &ModelConfig| (p.name.clone(), m.name.clone());

        match (&self.default_provider, &self.default_model) {
            (Some(provider_name), model) => {
                let provider = self.provider(provider_name).ok_or_else(|| {
                    ConfigError::UnknownSelection(format!("no provider named {provider_name:?}"))
                })?;
                let found = match model {
                    Some(model) => provider.model(model).ok_or_else(|| {
                        ConfigError::UnknownSelection(format!(
                            "provider {provider_name:?} has no model {model:?}"
                        ))
                    })?,
                    None => provider.default_model().ok_or_else(|| {
                        ConfigError::UnknownSelection(format!(
                            "provider {provider_name:?} has no models"
                        ))
                    })?,
                };
                Ok(pick(provider, found))
            }
            (None, Some(model)) => self
                .providers
                .iter()
                .find_map(|p| p.model(model).map(|m| pick(p, m)))
                .ok_or_else(|| {
                    ConfigError::UnknownSelection(format!("no provider offers model {model:?}"))
                }),
            (None, None) => self
                .providers
                .iter()
                .find_map(|p| p.models.iter().find(|m| m.default).map(|m| pick(p, m)))
                .or_else(|| {
                    self.providers
                        .first()
                        .and_then(|p| p.models.first().map(|m| pick(p, m)))
                })
                .ok_or_else(|| ConfigError::UnknownSelection("no models configured".into())),
        }
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            default_model: None,
            system_prompt: default_system_prompt(),
            clipboard_command: None,
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            max_tool_rounds: default_max_tool_rounds(),
            index: IndexConfig::default(),
            providers: vec![
                ProviderConfig {
                    name: "anthropic".into(),
                    kind: ProviderKind::Claude,
                    base_url: None,
                    api_key_env: Some("ANTHROPIC_API_KEY".into()),
                    api_key: None,
                    models: vec![
                        ModelConfig {
                            name: "claude-sonnet-4-20250514".into(),
                            short_name: Some("sonnet".into()),
                            default: true,
                            context_size: 200_000,
                        },
                        ModelConfig {
                            name: "claude-3-5-haiku-latest".into(),
                            short_name: Some("haiku".into()),
                            default: false,
                            context_size: 200_000,
                        },
                    ],
                },
                ProviderConfig {
                    name: "local".into(),
                    kind: ProviderKind::Ollama,
                    base_url: Some(ProviderKind::Ollama.default_base_url().into()),
                    api_key_env: None,
                    api_key: None,
                    models: vec![ModelConfig {
                        name: "qwen3:8b".into(),
                        short_name: Some("qwen".into()),
                        default: false,
                        context_size: default_context_size(),
                    }],
                },
            ],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Provider {provider:?} needs an API key: set {env}")]
    MissingCredential { provider: String, env: String },

    #[error("Invalid model selection: {0}")]
    UnknownSelection(String),
}

impl From<ConfigError> for tiller_core::Error {
    fn from(e: ConfigError) -> Self {
        tiller_core::Error::Config {
            message: e.to_string(),
        }
    }
}
