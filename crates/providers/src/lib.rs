//! LLM Provider implementations for Tiller.
//!
//! All providers implement the `tiller_core::Provider` trait.
//! The resolver builds the right one from configuration.

pub mod anthropic;
mod call_id;
mod http;
pub mod ollama;
pub mod openai_compat;
pub mod resolver;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use resolver::ConfigResolver;
