//! `tiller chat` — interactive or single-message chat mode.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tiller_agent::{Engine, status_line};
use tiller_config::{AppConfig, IndexConfig};
use tiller_core::error::ProviderError;
use tiller_core::index::FileIndex;
use tiller_core::provider::{Provider, ProviderResolver};
use tiller_index::{InMemoryFileIndex, Indexer, SqliteFileIndex};
use tiller_providers::ConfigResolver;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::terminal;

/// Lines typed ahead of the engine are buffered up to this many.
const INPUT_BUFFER: usize = 32;

pub async fn run(
    config_path: Option<PathBuf>,
    message: Option<String>,
    provider: Option<String>,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path);
    let config = super::load_config(&path)
        .map_err(|e| format!("Failed to load config from {}: {e}", path.display()))?;

    let clipboard_command = config.clipboard_command.clone();
    let max_tool_rounds = config.max_tool_rounds;
    let index_config = config.index.clone();
    let resolver = Arc::new(ConfigResolver::new(config)?);
    let active = startup_provider(&resolver, provider.as_deref(), model.as_deref())?;

    let cwd = std::env::current_dir()?;
    let index = open_index(&index_config, &cwd).await;
    let tools = Arc::new(tiller_tools::default_registry(&cwd, index.clone()));
    let indexer = Arc::new(Indexer::new(&cwd, index));
    info!(root = %cwd.display(), model = %active.model_info(), "Starting chat");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(terminal::render(events_rx));

    let mut engine = Engine::new(active, resolver, tools, events_tx)
        .with_cancellation(cancel.clone())
        .with_indexer(indexer)
        .with_clipboard_command(clipboard_command)
        .with_max_tool_rounds(max_tool_rounds);

    if let Some(message) = message {
        engine.submit(&message).await;
        drop(engine);
        let errors = renderer.await?;
        if errors > 0 {
            return Err("the request did not complete".into());
        }
        return Ok(());
    }

    println!("Chat with Tiller (use '/help' for commands, '/quit' to quit)");
    println!("{}", status_line(&engine.model_info()));

    let (lines_tx, lines_rx) = mpsc::channel(INPUT_BUFFER);
    terminal::spawn_stdin_reader(lines_tx);

    let transcript = engine.run(lines_rx).await;
    info!(
        conversation_id = %transcript.id,
        turns = transcript.len(),
        "Chat finished"
    );

    // Stops any index pass still talking to the model.
    cancel.cancel();
    renderer.await?;
    Ok(())
}

/// The configured file index. A SQLite store that cannot be opened falls back
/// to an in-memory one so the session can still start.
async fn open_index(config: &IndexConfig, root: &Path) -> Arc<dyn FileIndex> {
    if config.backend == "in_memory" {
        return Arc::new(InMemoryFileIndex::new());
    }

    let path = config.resolve_path(root);
    match SqliteFileIndex::open(&path).await {
        Ok(index) => Arc::new(index),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Falling back to an in-memory file index");
            Arc::new(InMemoryFileIndex::new())
        }
    }
}

/// Pick the adapter to start with from the command-line overrides, falling
/// back to the configured default.
fn startup_provider(
    resolver: &ConfigResolver,
    provider: Option<&str>,
    model: Option<&str>,
) -> Result<Arc<dyn Provider>, ProviderError> {
    match (provider, model) {
        (provider, Some(model)) => resolver.resolve(provider, model),
        (Some(provider), None) => {
            let model = default_model_of(resolver.config(), provider)?;
            resolver.resolve(Some(provider), &model)
        }
        (None, None) => resolver.resolve_default(),
    }
}

fn default_model_of(config: &AppConfig, provider: &str) -> Result<String, ProviderError> {
    config
        .provider(provider)
        .and_then(|p| p.default_model())
        .map(|m| m.name.clone())
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!("no provider named {provider:?} with models"))
        })
}
