//! Display events — the only way the engine talks to the user interface.
//!
//! The engine never writes to the terminal itself; it pushes these events onto
//! an unbounded channel and the renderer decides how each kind looks.

use serde::{Deserialize, Serialize};

/// Something the user should see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum DisplayEvent {
    /// Informational output (status, help, index progress)
    General(String),

    /// Text produced by the model
    Assistant(String),

    /// A tool invocation, rendered as `name(input)`
    Tool(String),

    /// A failure the user should know about
    Error(String),

    /// Ready for the next line of input
    Prompt,

    /// The session is over
    Exit,
}

impl DisplayEvent {
    pub fn general(text: impl Into<String>) -> Self {
        Self::General(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error(text.into())
    }

    /// Short name of the event kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::General(_) => "general",
            Self::Assistant(_) => "assistant",
            Self::Tool(_) => "tool",
            Self::Error(_) => "error",
            Self::Prompt => "prompt",
            Self::Exit => "exit",
        }
    }

    /// The event's text, if it carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::General(t) | Self::Assistant(t) | Self::Tool(t) | Self::Error(t) => Some(t),
            Self::Prompt | Self::Exit => None,
        }
    }
}
