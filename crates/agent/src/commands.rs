//! Slash commands: everything the human types that starts with `/`.
//!
//! Commands act on the engine directly and never touch the transcript, apart
//! from `/clear`.

use std::process::Stdio;
use std::sync::Arc;

use tiller_core::event::DisplayEvent;
use tiller_core::provider::ModelInfo;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::engine::Engine;

const SWITCH_USAGE: &str = "Usage: /switch <model> or /switch <provider> <model>";

const HELP: &[(&str, &str)] = &[
    ("/help", "Show this help message"),
    ("/status", "Show current LLM"),
    ("/models", "List available models"),
    ("/switch [model]", "Switch to model with complete name or short name"),
    ("/switch [provider] [model]", "Switch to specific provider model"),
    ("/clear", "Reset conversation, clear the context"),
    ("/copy", "Copy last message to the clipboard"),
    ("/index", "Summarize new and changed files in the working directory"),
    ("/reindex", "Summarize every file in the working directory again"),
    ("/quit", "Exit the agent"),
];

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Status,
    Help,
    Models,
    /// `/switch` with its raw, trimmed arguments
    Switch(String),
    Clear,
    Copy,
    /// Incremental (`/index`) or full (`/reindex`) index refresh
    Index { full: bool },
    /// Anything else starting with `/`
    Unknown(String),
}

impl Command {
    /// Parse a line of input. Returns `None` for anything that is not a slash
    /// command.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let rest = input.strip_prefix('/')?;
        let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));

        Some(match name {
            "quit" => Self::Quit,
            "status" => Self::Status,
            "help" => Self::Help,
            "models" => Self::Models,
            "switch" => Self::Switch(args.trim().to_string()),
            "clear" => Self::Clear,
            "copy" => Self::Copy,
            "index" => Self::Index { full: false },
            "reindex" => Self::Index { full: true },
            _ => Self::Unknown(format!("/{name}")),
        })
    }
}

/// `(provider, model)` from `/switch` arguments.
fn switch_target(args: &str) -> Option<(Option<&str>, &str)> {
    if args.is_empty() {
        return None;
    }
    match args.split_once(char::is_whitespace) {
        Some((provider, model)) => Some((Some(provider), model.trim())),
        None => Some((None, args)),
    }
}

/// `Current LLM: provider: model (short)`
pub fn status_line(info: &ModelInfo) -> String {
    match &info.short_name {
        Some(short) => format!("Current LLM: {}: {} ({})", info.provider, info.model, short),
        None => format!("Current LLM: {}: {}", info.provider, info.model),
    }
}

fn help_text() -> String {
    let mut text = String::from("Available commands:\n\n");
    for (command, description) in HELP {
        text.push_str(&format!("- {command}: {description}\n"));
    }
    text
}

fn models_text(models: &[ModelInfo], current: &ModelInfo) -> String {
    let mut text = String::from("Available models:\n\n");
    for model in models {
        let marker = if model.provider == current.provider && model.model == current.model {
            '*'
        } else {
            '-'
        };
        text.push_str(&format!("{marker} {}: {}", model.provider, model.model));
        if let Some(short) = &model.short_name {
            text.push_str(&format!(" ({short})"));
        }
        text.push('\n');
    }
    text
}

/// Pipe `text` into `sh -c <command>`.
async fn copy_to_clipboard(command: &str, text: &str) -> std::io::Result<()> {
    let mut child = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await?;
    }

    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("`{command}` exited with {status}")))
    }
}

impl Engine {
    /// Run `raw` if it is a slash command.
    ///
    /// Returns true when the input was consumed as a command, recognised or
    /// not, so it must not be sent to the model.
    pub async fn handle_command(&mut self, raw: &str) -> bool {
        let Some(command) = Command::parse(raw) else {
            return false;
        };
        debug!(?command, "Running command");

        match command {
            Command::Quit => self.exit(),
            Command::Status => self.show_status(),
            Command::Help => self.emit(DisplayEvent::general(help_text())),
            Command::Models => {
                let models = self.resolver.available_models();
                self.emit(DisplayEvent::general(models_text(&models, &self.model_info())));
            }
            Command::Switch(args) => self.switch_model(&args),
            Command::Clear => {
                self.conversation.clear();
                info!(conversation_id = %self.conversation.id, "Conversation cleared");
                self.emit(DisplayEvent::general("Context cleared"));
            }
            Command::Copy => self.copy_last_message().await,
            Command::Index { full } => self.start_index(full),
            Command::Unknown(name) => {
                self.emit(DisplayEvent::error(format!("unknown command: {name}")));
            }
        }
        true
    }

    fn show_status(&self) {
        let info = self.model_info();
        let turns = self.conversation.len();
        self.emit(DisplayEvent::general(format!(
            "{}\nConversation: {turns} turn(s)",
            status_line(&info)
        )));
    }

    fn switch_model(&mut self, args: &str) {
        let Some((provider, model)) = switch_target(args) else {
            self.emit(DisplayEvent::error(SWITCH_USAGE));
            return;
        };

        match self.resolver.resolve(provider, model) {
            Ok(next) => {
                info!(from = %self.model_info(), to = %next.model_info(), "Switched model");
                self.provider = next;
                self.show_status();
            }
            Err(e) => {
                warn!(model, error = %e, "Switch failed");
                self.emit(DisplayEvent::error(format!("failed to switch: {e}")));
            }
        }
    }

    async fn copy_last_message(&self) {
        let Some(command) = self.clipboard_command.as_deref() else {
            self.emit(DisplayEvent::error("No clipboard command configured in config file"));
            return;
        };
        let Some(text) = self.conversation.last_assistant_text() else {
            self.emit(DisplayEvent::error("No assistant message found to copy"));
            return;
        };

        match copy_to_clipboard(command, &text).await {
            Ok(()) => self.emit(DisplayEvent::general("Last message copied to clipboard")),
            Err(e) => {
                warn!(error = %e, "Clipboard command failed");
                self.emit(DisplayEvent::error(format!("Failed to copy to clipboard: {e}")));
            }
        }
    }

    /// Kick off a refresh pass in the background; progress arrives as events.
    fn start_index(&self, full: bool) {
        let Some(indexer) = &self.indexer else {
            self.emit(DisplayEvent::error("file index is not enabled"));
            return;
        };

        let indexer = Arc::clone(indexer);
        let provider = Arc::clone(&self.provider);
        let cancel = self.cancel.clone();
        let out = self.output();

        tokio::spawn(async move {
            match indexer.refresh(provider, full, &cancel, &out).await {
                Ok(outcome) => debug!(?outcome, "Index refresh finished"),
                Err(e) => {
                    warn!(error = %e, "Index refresh failed");
                    let _ = out.send(DisplayEvent::error(format!("indexing failed: {e}")));
                }
            }
        });
    }
}
