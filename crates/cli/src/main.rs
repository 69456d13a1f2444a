//! Tiller CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Interactive chat (the default) or a single message
//! - `models`  — List configured providers and models
//! - `init`    — Write the default configuration file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod terminal;

#[derive(Parser)]
#[command(
    name = "tiller",
    about = "Tiller — chat with an LLM that can read your working directory",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use this configuration file instead of ~/.config/tiller/config.toml
    #[arg(short, long, global = true, env = "TILLER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the model (default)
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Provider to start with
        #[arg(short, long)]
        provider: Option<String>,

        /// Model (full or short name) to start with
        #[arg(long)]
        model: Option<String>,
    },

    /// List configured providers and models
    Models,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr and stay quiet by default so they do not interleave
    // with the chat.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = cli.config;
    match cli.command.unwrap_or(Commands::Chat {
        message: None,
        provider: None,
        model: None,
    }) {
        Commands::Chat {
            message,
            provider,
            model,
        } => commands::chat::run(config, message, provider, model).await?,
        Commands::Models => commands::models::run(config)?,
        Commands::Init { force } => commands::init::run(config, force)?,
    }

    Ok(())
}
