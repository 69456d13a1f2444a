//! Ids for tool calls the backend sent without one.

use tiller_core::message::Turn;

/// Hands out `tool_call_<n>` ids. Numbering starts after the tool uses already
/// in the transcript, so a synthesized id never repeats within a conversation
/// even when another adapter later replays the whole history.
pub(crate) struct CallIds {
    next: usize,
}

impl CallIds {
    pub(crate) fn after(conversation: &[Turn]) -> Self {
        Self {
            next: conversation.iter().map(|t| t.tool_uses().count()).sum(),
        }
    }

    pub(crate) fn next_id(&mut self) -> String {
        let id = format!("tool_call_{}", self.next);
        self.next += 1;
        id
    }
}
