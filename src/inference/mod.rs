//! Inference client: the language-model capability behind tool selection
//! and response synthesis.
//!
//! This module handles all communication with the chat-completion endpoint:
//! - Non-streaming chat completions with an optional tool catalog
//! - Tool call parsing from the OpenAI response format
//! - Fallback chain management across configured models
//!
//! The client speaks the OpenAI Chat Completions API, so switching providers
//! is a config change, not a code change.

pub mod capability;
pub mod client;
pub mod config;
pub mod errors;
pub mod response;
pub mod types;

// Re-exports for convenience
pub use capability::ChatCapability;
pub use client::InferenceClient;
pub use config::{resolve_active_model, ModelConfig, ModelsConfig};
pub use errors::InferenceError;
pub use types::{ChatMessage, Completion, Role, ToolCall, ToolDefinition};
