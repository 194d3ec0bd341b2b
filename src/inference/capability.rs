//! The language-model capability consumed by tool selection and synthesis.

use async_trait::async_trait;

use super::errors::InferenceError;
use super::types::{ChatMessage, Completion, ToolDefinition};

/// A chat-completion-style capability: a structured message list plus an
/// optional tool catalog in, free text or tool-call requests out.
///
/// [`InferenceClient`](super::InferenceClient) is the HTTP implementation;
/// anything else that can answer a chat request (a scripted mock, a local
/// runtime) plugs in behind the same seam.
#[async_trait]
pub trait ChatCapability: Send + Sync {
    /// Run one completion. `tools: None` means plain text generation.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Completion, InferenceError>;

    /// Human-readable name of the backing model, for logs.
    fn model_name(&self) -> &str;
}
