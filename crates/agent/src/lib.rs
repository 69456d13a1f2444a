//! The conversation engine: the heart of Tiller.
//!
//! The engine alternates between three states:
//!
//! 1. **AwaitingUserInput**: read a line; slash commands go to the command
//!    interpreter, anything else becomes a user turn
//! 2. **AwaitingModel**: send the full transcript and tool catalog to the
//!    active provider and commit the assistant turn it returns
//! 3. **Tool execution**: run every requested tool in order, commit the results
//!    as one user turn, and go straight back to the model
//!
//! Control returns to the human once the model answers without tool uses.

pub mod commands;
pub mod engine;

#[cfg(test)]
mod test_helpers;

pub use commands::{Command, status_line};
pub use engine::{Engine, EngineState};
