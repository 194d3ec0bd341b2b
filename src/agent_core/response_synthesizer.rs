//! Response synthesis: turns tool outcomes into one natural-language answer.
//!
//! The outcomes (failures included, verbatim) go to the language model with
//! an instruction to answer only from them. When the model is unavailable
//! the outcomes are rendered deterministically instead, so computed results
//! are never lost.

use std::sync::Arc;

use serde_json::Value;

use super::types::ToolOutcome;
use crate::inference::{ChatCapability, ChatMessage};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that interprets tool results and \
provides clear, concise explanations. Format your response in a natural, easy-to-understand \
way and focus on the key information in the tool results. Keep the explanation related to the \
original query only and do not add your own knowledge. If a tool failed, say so plainly.";

pub struct ResponseSynthesizer {
    capability: Arc<dyn ChatCapability>,
}

impl ResponseSynthesizer {
    pub fn new(capability: Arc<dyn ChatCapability>) -> Self {
        Self { capability }
    }

    /// Produce the final answer. Never fails and never returns empty text.
    pub async fn synthesize(&self, original_query: &str, outcomes: &[ToolOutcome]) -> String {
        let payload = match serde_json::to_string_pretty(outcomes) {
            Ok(payload) => payload,
            Err(e) => return render_fallback(&e.to_string(), outcomes),
        };

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Original query: {original_query}\n\n\
                 Tool results:\n{payload}\n\n\
                 Please provide a clear, natural response that addresses the original query \
                 using these tool results."
            )),
        ];

        match self.capability.complete(messages, None).await {
            Ok(completion) => match completion.text {
                Some(text) => text,
                None => {
                    tracing::warn!("synthesis returned no text, using fallback rendering");
                    render_fallback("model returned no text", outcomes)
                }
            },
            Err(e) => {
                tracing::warn!(
                    model = %self.capability.model_name(),
                    error = %e,
                    "synthesis failed, using fallback rendering"
                );
                render_fallback(&e.to_string(), outcomes)
            }
        }
    }
}

/// Deterministic rendering: a header line, then one line per outcome in
/// request order.
pub fn render_fallback(reason: &str, outcomes: &[ToolOutcome]) -> String {
    let mut text = format!("Error processing tool results: {reason}");
    if outcomes.is_empty() {
        text.push_str("\nNo tool results.");
    }
    for outcome in outcomes {
        let line = match outcome {
            ToolOutcome::Success {
                tool_name, result, ..
            } => format!("{tool_name}: {}", render_value(result)),
            ToolOutcome::Failure {
                tool_name,
                error_message,
                ..
            } => format!("{tool_name}: error: {error_message}"),
        };
        text.push('\n');
        text.push_str(&line);
    }
    text
}

/// Strings print bare; everything else prints as compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
