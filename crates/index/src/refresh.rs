//! Incremental index refresh.
//!
//! A pass walks the working directory, hashes every file, asks the model for
//! a summary of each new or changed file, and drops entries whose files are
//! gone. Only one pass runs at a time; a request made while one is running is
//! turned away, not queued.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tiller_core::error::IndexError;
use tiller_core::event::DisplayEvent;
use tiller_core::index::{FileIndex, IndexedFile};
use tiller_core::message::{ContentBlock, Turn};
use tiller_core::provider::Provider;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Only the head of a file is sent for summarization.
const MAX_SUMMARY_INPUT_BYTES: usize = 10_000;

const HASH_CHUNK_BYTES: usize = 64 * 1024;

pub const BUSY_NOTICE: &str = "indexer currently working, try again later";

/// What a refresh request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another pass was running; nothing happened.
    Busy,
    /// Every file was already up to date.
    UpToDate { removed: usize },
    /// `indexed` files were (re)summarized.
    Indexed { indexed: usize, removed: usize },
}

/// Owns the single-flight refresh of one [`FileIndex`].
pub struct Indexer {
    root: PathBuf,
    index: Arc<dyn FileIndex>,
    busy: AtomicBool,
}

/// Clears the busy flag when the pass ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Indexer {
    pub fn new(root: impl Into<PathBuf>, index: Arc<dyn FileIndex>) -> Self {
        Self {
            root: root.into(),
            index,
            busy: AtomicBool::new(false),
        }
    }

    pub fn index(&self) -> Arc<dyn FileIndex> {
        Arc::clone(&self.index)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run one refresh pass, summarizing with `provider`.
    ///
    /// With `full`, every file is re-summarized regardless of its hash.
    /// Progress goes to `out` as general events.
    pub async fn refresh(
        &self,
        provider: Arc<dyn Provider>,
        full: bool,
        cancel: &CancellationToken,
        out: &UnboundedSender<DisplayEvent>,
    ) -> Result<RefreshOutcome, IndexError> {
        if self.busy.swap(true, Ordering::AcqRel) {
            let _ = out.send(DisplayEvent::general(BUSY_NOTICE));
            return Ok(RefreshOutcome::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let current = scan(&self.root).await?;
        let known = self.index.find_all().await?;

        let mut removed = 0;
        for path in known.keys().filter(|p| !current.contains_key(*p)) {
            if self.index.delete(path).await? {
                removed += 1;
            }
        }

        let needs_update: Vec<(&String, &String)> = current
            .iter()
            .filter(|(path, hash)| full || known.get(*path).is_none_or(|k| &k.hash != *hash))
            .collect();

        if needs_update.is_empty() {
            let _ = out.send(DisplayEvent::general("nothing to index"));
            debug!(removed, "Index up to date");
            return Ok(RefreshOutcome::UpToDate { removed });
        }

        let _ = out.send(DisplayEvent::general(format!(
            "indexing {} file(s)...",
            needs_update.len()
        )));

        let model = provider.model_info();
        info!(files = needs_update.len(), full, model = %model, "Index refresh started");

        for (path, hash) in &needs_update {
            let summary = self.summarize(provider.as_ref(), path, cancel).await?;
            self.index
                .store(IndexedFile {
                    path: path.to_string(),
                    hash: hash.to_string(),
                    updated: Utc::now(),
                    summary,
                })
                .await?;
            debug!(path = %path, "Indexed file");
        }

        let _ = out.send(DisplayEvent::general(format!(
            "indexed {} file(s)",
            needs_update.len()
        )));

        Ok(RefreshOutcome::Indexed {
            indexed: needs_update.len(),
            removed,
        })
    }

    async fn summarize(
        &self,
        provider: &dyn Provider,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<String, IndexError> {
        let bytes = tokio::fs::read(self.root.join(path))
            .await
            .map_err(|e| IndexError::Scan {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        let head = &bytes[..bytes.len().min(MAX_SUMMARY_INPUT_BYTES)];
        let content = String::from_utf8_lossy(head);

        let conversation = [Turn::user_text(summary_prompt(path, &content))];
        let reply = provider
            .run_inference(cancel, &[], &conversation)
            .await
            .map_err(|source| IndexError::Summarize {
                path: path.to_string(),
                source,
            })?;

        Ok(reply
            .blocks
            .into_iter()
            .find_map(|b| match b {
                ContentBlock::Text { text } => Some(text),
                _ => None,
            })
            .unwrap_or_default())
    }
}

/// Hash every non-hidden file under `root`, keyed by `/`-separated relative
/// path. Entries whose name starts with `.` are skipped, directories included.
async fn scan(root: &Path) -> Result<BTreeMap<String, String>, IndexError> {
    let scan_err = |path: &Path, e: std::io::Error| IndexError::Scan {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let mut files = BTreeMap::new();
    let mut pending = vec![(root.to_path_buf(), String::new())];

    while let Some((dir, prefix)) = pending.pop() {
        let mut read_dir = tokio::fs::read_dir(&dir).await.map_err(|e| scan_err(&dir, e))?;
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| scan_err(&dir, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            let relative = format!("{prefix}{name}");
            let file_type = entry.file_type().await.map_err(|e| scan_err(&path, e))?;
            if file_type.is_dir() {
                pending.push((path, format!("{relative}/")));
            } else if file_type.is_file() {
                let hash = hash_file(&path).await.map_err(|e| scan_err(&path, e))?;
                files.insert(relative, hash);
            }
        }
    }

    Ok(files)
}

/// Hex SHA-256 of a file's content, read in chunks.
async fn hash_file(path: &Path) -> std::io::Result<String> {
    let file = tokio::fs::File::open(path).await?;
    let mut reader = BufReader::with_capacity(HASH_CHUNK_BYTES, file);
    let mut hasher = Sha256::new();
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            break;
        }
        hasher.update(chunk);
        let consumed = chunk.len();
        reader.consume(consumed);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Pick the summarization prompt by file extension.
pub fn summary_prompt(path: &str, content: &str) -> String {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let (kind, ask) = match extension {
        "rs" | "go" | "js" | "ts" | "py" | "java" | "c" | "cpp" | "h" => (
            "a code file",
            "what this code does, including key functions, purpose, and any notable patterns or techniques",
        ),
        "md" | "txt" | "adoc" => ("a text document", "the main ideas and content in this document"),
        "json" | "yaml" | "yml" | "toml" => (
            "a configuration file",
            "what this configuration defines or controls",
        ),
        _ => ("a file", "what this file contains or defines"),
    };

    format!(
        "This is {kind}: {path}\nPlease provide a concise summary (under 200 words) of {ask}:\n\n{content}"
    )
}
