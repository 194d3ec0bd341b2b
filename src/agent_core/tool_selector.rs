//! Tool selection: asks the language model which tools to run.
//!
//! The model sees a system prompt listing every catalog tool with its
//! preference hint, the recent conversation, and the user query. It answers
//! either with text (a direct answer) or with tool calls.
//!
//! Capability failures are fatal for the turn and are not retried here; the
//! inference client owns fallback across models.

use std::sync::Arc;

use super::errors::AgentError;
use super::types::{Invocation, SelectorOutcome};
use crate::inference::{ChatCapability, ChatMessage};
use crate::tools::ToolRegistry;

/// One prior exchange carried into the next selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub query: String,
    pub answer: String,
}

pub struct ToolSelector {
    capability: Arc<dyn ChatCapability>,
}

impl ToolSelector {
    pub fn new(capability: Arc<dyn ChatCapability>) -> Self {
        Self { capability }
    }

    /// Decide between a direct answer and a list of invocations.
    ///
    /// Tool names are passed through unchecked; the executor turns names
    /// outside the catalog into failure outcomes.
    pub async fn select(
        &self,
        query: &str,
        file_reference: Option<&str>,
        registry: &ToolRegistry,
        history: &[HistoryTurn],
    ) -> Result<SelectorOutcome, AgentError> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(build_system_prompt(
            registry,
            file_reference,
        )));
        for turn in history {
            messages.push(ChatMessage::user(turn.query.clone()));
            messages.push(ChatMessage::assistant(turn.answer.clone()));
        }
        messages.push(ChatMessage::user(query));

        let completion = self
            .capability
            .complete(messages, Some(registry.tool_definitions()))
            .await
            .map_err(|e| {
                tracing::error!(
                    model = %self.capability.model_name(),
                    error = %e,
                    "tool selection call failed"
                );
                AgentError::SelectionFailed {
                    reason: e.to_string(),
                }
            })?;

        if completion.finish_reason.as_deref() == Some("length") {
            tracing::warn!(
                model = %self.capability.model_name(),
                "selection hit the token limit, answer may be truncated"
            );
        }

        if completion.has_tool_calls() {
            let invocations: Vec<Invocation> = completion
                .tool_calls
                .into_iter()
                .map(|call| Invocation::new(call.name, call.arguments))
                .collect();
            tracing::info!(
                count = invocations.len(),
                tools = ?invocations.iter().map(|i| i.tool_name.as_str()).collect::<Vec<_>>(),
                finish_reason = ?completion.finish_reason,
                "selector requested tools"
            );
            return Ok(SelectorOutcome::Invocations(invocations));
        }

        match completion.text {
            Some(text) => {
                tracing::info!(
                    finish_reason = ?completion.finish_reason,
                    "selector answered directly"
                );
                Ok(SelectorOutcome::Direct { text })
            }
            None => Err(AgentError::SelectionFailed {
                reason: "model returned neither text nor tool calls".into(),
            }),
        }
    }
}

/// System prompt: capabilities, disambiguation rules, current file.
pub fn build_system_prompt(registry: &ToolRegistry, file_reference: Option<&str>) -> String {
    format!(
        "You are a helpful assistant that answers by calling tools.\n\
         \n\
         Available tools:\n\
         {tools}\n\
         \n\
         Current file path: {file}\n\
         \n\
         When processing queries:\n\
         1. Consider previous results when they are relevant.\n\
         2. For translation to French only, use analyze_multimodal_content with the \
         language parameters.\n\
         3. For new image analysis, always use the current file path.\n\
         4. Chain operations logically when several steps are needed.\n\
         5. Only use tools to answer queries; do not use your own knowledge.",
        tools = registry.capability_summary(),
        file = file_reference.unwrap_or("No file"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{Completion, InferenceError, Role, ToolCall, ToolDefinition};
    use crate::tools::{Tool, ToolError, ToolId};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Returns one canned answer and records what it was asked.
    struct Scripted {
        answer: Mutex<Option<Result<Completion, InferenceError>>>,
        seen: Mutex<Vec<(Vec<ChatMessage>, usize)>>,
    }

    impl Scripted {
        fn new(answer: Result<Completion, InferenceError>) -> Arc<Self> {
            Arc::new(Self {
                answer: Mutex::new(Some(answer)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatCapability for Scripted {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            tools: Option<Vec<ToolDefinition>>,
        ) -> Result<Completion, InferenceError> {
            let tool_count = tools.map(|t| t.len()).unwrap_or(0);
            self.seen.lock().unwrap().push((messages, tool_count));
            self.answer.lock().unwrap().take().unwrap()
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct Noop;

    #[async_trait]
    impl Tool for Noop {
        async fn execute(&self, _arguments: &Value) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for id in ToolId::ALL {
            registry.register(id, Arc::new(Noop));
        }
        registry
    }

    #[tokio::test]
    async fn test_tool_calls_become_invocations_in_order() {
        let capability = Scripted::new(Ok(Completion::from_tool_calls(vec![
            ToolCall {
                id: "1".into(),
                name: "analyze_sentiment".into(),
                arguments: json!({"text": "hi"}),
            },
            ToolCall {
                id: "2".into(),
                name: "made_up_tool".into(),
                arguments: json!({}),
            },
        ])));
        let selector = ToolSelector::new(capability.clone());

        let outcome = selector
            .select("how do I sound?", Some("/tmp/x.png"), &registry(), &[])
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SelectorOutcome::Invocations(vec![
                Invocation::new("analyze_sentiment", json!({"text": "hi"})),
                Invocation::new("made_up_tool", json!({})),
            ])
        );

        let seen = capability.seen.lock().unwrap();
        let (messages, tool_count) = &seen[0];
        assert_eq!(*tool_count, 3);
        let system = messages[0].content.as_deref().unwrap();
        assert!(system.contains("Current file path: /tmp/x.png"));
        assert!(system.contains("process_with_gemini"));
    }

    #[tokio::test]
    async fn test_text_is_direct_answer() {
        let capability = Scripted::new(Ok(Completion::from_text("Hello!")));
        let outcome = ToolSelector::new(capability)
            .select("hi", None, &registry(), &[])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SelectorOutcome::Direct {
                text: "Hello!".into()
            }
        );
    }

    #[tokio::test]
    async fn test_history_precedes_query() {
        let capability = Scripted::new(Ok(Completion::from_text("ok")));
        let history = vec![HistoryTurn {
            query: "translate hello".into(),
            answer: "bonjour".into(),
        }];
        ToolSelector::new(capability.clone())
            .select("and goodbye?", None, &registry(), &history)
            .await
            .unwrap();

        let seen = capability.seen.lock().unwrap();
        let messages = &seen[0].0;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].content.as_deref(), Some("bonjour"));
        assert_eq!(messages[3].content.as_deref(), Some("and goodbye?"));
        assert!(messages[0]
            .content
            .as_deref()
            .unwrap()
            .contains("Current file path: No file"));
    }

    #[tokio::test]
    async fn test_truncated_text_is_still_direct_answer() {
        let completion = Completion {
            finish_reason: Some("length".into()),
            ..Completion::from_text("Partial ans")
        };
        let outcome = ToolSelector::new(Scripted::new(Ok(completion)))
            .select("hi", None, &registry(), &[])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SelectorOutcome::Direct {
                text: "Partial ans".into()
            }
        );
    }

    #[tokio::test]
    async fn test_capability_failure_is_selection_failure() {
        let capability = Scripted::new(Err(InferenceError::Timeout { duration_secs: 60 }));
        let err = ToolSelector::new(capability)
            .select("hi", None, &registry(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::SelectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_empty_completion_is_selection_failure() {
        let capability = Scripted::new(Ok(Completion::default()));
        let err = ToolSelector::new(capability)
            .select("hi", None, &registry(), &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("neither text nor tool calls"));
    }
}
