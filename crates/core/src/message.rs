//! Canonical message model.
//!
//! Every provider adapter translates to and from these types. A [`Turn`] is
//! one role-tagged, ordered set of [`ContentBlock`]s; a [`Conversation`] is the
//! append-only transcript sent to the model on every call.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConversationError;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human, or the engine reporting tool results
    User,
    /// The model
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// The minimal unit of turn content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },

    /// A tool invocation request. Only produced by assistant turns.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// The outcome of a tool invocation, answering the `ToolUse` with the
    /// same id. Only found in user turns.
    ToolResult {
        id: String,
        result: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(id: impl Into<String>, result: impl Into<String>, is_error: bool) -> Self {
        Self::ToolResult {
            id: id.into(),
            result: result.into(),
            is_error,
        }
    }

    /// Wire name of the block kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
        }
    }
}

/// One role-tagged, ordered set of content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
}

impl Turn {
    /// A human text turn.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            blocks: vec![ContentBlock::text(text)],
        }
    }

    /// An assistant turn, as produced by one model call.
    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            blocks,
        }
    }

    /// A user turn carrying a batch of tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            blocks: results,
        }
    }

    /// Check the structural invariants of a single turn.
    pub fn validate(&self) -> Result<(), ConversationError> {
        match self.role {
            Role::User => {
                let mut has_text = false;
                let mut has_results = false;
                for block in &self.blocks {
                    match block {
                        ContentBlock::Text { .. } => has_text = true,
                        ContentBlock::ToolResult { .. } => has_results = true,
                        ContentBlock::ToolUse { .. } => {
                            return Err(ConversationError::MisplacedBlock {
                                role: "user",
                                block: "tool_use",
                            });
                        }
                    }
                }
                if has_text && has_results {
                    return Err(ConversationError::MixedUserTurn);
                }
            }
            Role::Assistant => {
                let mut ids = HashSet::new();
                for block in &self.blocks {
                    match block {
                        ContentBlock::ToolResult { .. } => {
                            return Err(ConversationError::MisplacedBlock {
                                role: "assistant",
                                block: "tool_result",
                            });
                        }
                        ContentBlock::ToolUse { id, .. } if !ids.insert(id.as_str()) => {
                            return Err(ConversationError::DuplicateToolUse(id.clone()));
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether this turn requests at least one tool invocation.
    pub fn has_tool_use(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }

    /// The tool uses of this turn as `(id, name, input)`, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.blocks.iter().filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }

    /// Ids of the tool uses in this turn, in order.
    pub fn tool_use_ids(&self) -> Vec<&str> {
        self.tool_uses().map(|(id, _, _)| id).collect()
    }

    /// Ids answered by the tool results in this turn, in order.
    pub fn tool_result_ids(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All text blocks joined with newlines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Whether `turn` (taken as the latest turn of a transcript) leaves tool uses
/// waiting for results.
pub fn has_unresolved_tool_use(turn: &Turn) -> bool {
    turn.role == Role::Assistant && turn.has_tool_use()
}

/// An ordered, append-only transcript.
///
/// [`Conversation::push`] rejects any turn that would break tool-use/result
/// pairing, so the transcript handed to a provider is always well formed.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    /// Unique conversation ID, used for log correlation
    pub id: ConversationId,

    turns: Vec<Turn>,

    /// When this conversation was created (or last cleared)
    pub created_at: DateTime<Utc>,

    /// When the last turn was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn, enforcing the pairing invariants.
    pub fn push(&mut self, turn: Turn) -> Result<(), ConversationError> {
        turn.validate()?;
        let pending = self.pending_tool_use_ids();

        match turn.role {
            Role::Assistant => {
                if let Some(id) = pending.first() {
                    return Err(ConversationError::UnansweredToolUse(id.to_string()));
                }
            }
            Role::User => {
                let answered = turn.tool_result_ids();
                if answered.is_empty() {
                    if let Some(id) = pending.first() {
                        return Err(ConversationError::UnansweredToolUse(id.to_string()));
                    }
                } else {
                    let mut seen = HashSet::new();
                    for id in &answered {
                        if !pending.contains(id) {
                            return Err(ConversationError::UnexpectedToolResult(id.to_string()));
                        }
                        if !seen.insert(*id) {
                            return Err(ConversationError::DuplicateToolResult(id.to_string()));
                        }
                    }
                    if let Some(missing) = pending.iter().find(|id| !seen.contains(*id)) {
                        return Err(ConversationError::UnansweredToolUse(missing.to_string()));
                    }
                }
            }
        }

        self.updated_at = Utc::now();
        self.turns.push(turn);
        Ok(())
    }

    /// The transcript in chronological order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop every turn and start a fresh session id.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Tool uses of the latest assistant turn that still await results.
    pub fn pending_tool_use_ids(&self) -> Vec<&str> {
        match self.turns.last() {
            Some(turn) if has_unresolved_tool_use(turn) => turn.tool_use_ids(),
            _ => Vec::new(),
        }
    }

    pub fn has_unresolved_tool_use(&self) -> bool {
        self.turns.last().is_some_and(has_unresolved_tool_use)
    }

    /// Text of the most recent assistant turn that has any.
    pub fn last_assistant_text(&self) -> Option<String> {
        self.turns
            .iter()
            .rev()
            .filter(|t| t.role == Role::Assistant)
            .map(Turn::text)
            .find(|text| !text.is_empty())
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
