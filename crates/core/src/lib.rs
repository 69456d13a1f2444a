//! # Tiller Core
//!
//! Domain types, traits, and error definitions for the Tiller terminal agent.
//! This crate has **no I/O of its own**: it defines the canonical conversation
//! model and the seams (`Provider`, `Tool`, `FileIndex`) that the other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping backends at runtime via configuration
//! - Easy testing with scripted mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod index;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ConversationError, Error, IndexError, ProviderError, Result, ToolError};
pub use event::DisplayEvent;
pub use index::{FileIndex, IndexedFile};
pub use message::{ContentBlock, Conversation, ConversationId, Role, Turn};
pub use provider::{ModelInfo, Provider, ProviderResolver, ToolDefinition};
pub use tool::{Tool, ToolRegistry};
