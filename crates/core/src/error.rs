//! Error types for the Tiller domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] aggregates them.

use thiserror::Error;

/// The top-level error type for all Tiller operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Conversation invariants ---
    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    // --- File index ---
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of a provider adapter call. None of these are ever committed to
/// the conversation.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("unknown model: could not find model {model:?} in provider {provider:?}")]
    UnknownModel { provider: String, model: String },

    #[error("Unsupported content from provider: {0}")]
    UnsupportedContent(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request cancelled")]
    Cancelled,
}

/// Failures of a tool execution. These are recoverable: the engine commits
/// them to the transcript as error-flagged tool results.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("{path}: {reason}")]
    Io { path: String, reason: String },

    #[error("tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("permission denied for {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },
}

/// Violations of the transcript invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("user turn mixes text and tool results")]
    MixedUserTurn,

    #[error("{role} turn contains a {block} block")]
    MisplacedBlock { role: &'static str, block: &'static str },

    #[error("tool use {0:?} has no result")]
    UnansweredToolUse(String),

    #[error("tool result {0:?} does not answer a pending tool use")]
    UnexpectedToolResult(String),

    #[error("tool use {0:?} answered more than once")]
    DuplicateToolResult(String),

    #[error("tool use id {0:?} appears more than once in a turn")]
    DuplicateToolUse(String),
}

/// Failures of the file index store or of a refresh pass.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to scan {path}: {reason}")]
    Scan { path: String, reason: String },

    #[error("Summarization of {path} failed: {source}")]
    Summarize {
        path: String,
        #[source]
        source: ProviderError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn unknown_model_names_provider_and_model() {
        let err = ProviderError::UnknownModel {
            provider: "local".into(),
            model: "llama9".into(),
        };
        let text = err.to_string();
        assert!(text.starts_with("unknown model"));
        assert!(text.contains("llama9"));
        assert!(text.contains("local"));
    }

    #[test]
    fn tool_io_error_is_plain() {
        let err = ToolError::Io {
            path: "src/main.rs".into(),
            reason: "No such file or directory".into(),
        };
        assert_eq!(err.to_string(), "src/main.rs: No such file or directory");
    }
}
