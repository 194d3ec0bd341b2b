//! Tool registry: the static catalog the selector and executor share.
//!
//! Provides:
//! - Lookup by requested name, rejecting names outside the closed set
//! - Required-field validation of tool call arguments
//! - Serialization of the catalog into OpenAI function-calling format
//! - A capability summary for the selector's system prompt

use std::sync::Arc;

use serde_json::Value;

use super::errors::ToolError;
use super::types::{Tool, ToolId, ToolSpec};
use crate::inference::ToolDefinition;

/// A catalog entry bound to its implementation.
#[derive(Clone)]
pub struct RegisteredTool {
    pub spec: ToolSpec,
    pub implementation: Arc<dyn Tool>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.spec.name())
            .finish()
    }
}

// ─── ToolRegistry ────────────────────────────────────────────────────────────

/// Catalog of bound tools. Built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an implementation to a tool. Rebinding replaces the previous one.
    pub fn register(&mut self, id: ToolId, implementation: Arc<dyn Tool>) {
        self.tools.retain(|t| t.spec.id != id);
        self.tools.push(RegisteredTool {
            spec: id.spec(),
            implementation,
        });
        self.tools.sort_by_key(|t| catalog_position(t.spec.id));
    }

    /// Look up a tool by the name the model requested.
    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool, ToolError> {
        let id = ToolId::from_name(name)?;
        self.tools
            .iter()
            .find(|t| t.spec.id == id)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    /// Check that every required field is present in `arguments`.
    ///
    /// Structural only; value types are left for the tool to judge.
    pub fn validate_arguments(spec: &ToolSpec, arguments: &Value) -> Result<(), ToolError> {
        let obj = arguments
            .as_object()
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: spec.name().to_string(),
                reason: "arguments must be a JSON object".into(),
            })?;

        for field in spec.required {
            let present = obj.get(*field).map(|v| !v.is_null()).unwrap_or(false);
            if !present {
                return Err(ToolError::InvalidArguments {
                    tool: spec.name().to_string(),
                    reason: format!("missing required field: '{field}'"),
                });
            }
        }

        Ok(())
    }

    /// All registered tools in catalog order.
    pub fn tools(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.iter()
    }

    /// Serialize the catalog into OpenAI function-calling format.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.spec.to_definition()).collect()
    }

    /// One line per tool: name, description and when to prefer it.
    pub fn capability_summary(&self) -> String {
        if self.is_empty() {
            return "No tools are currently available.".to_string();
        }

        self.tools
            .iter()
            .map(|t| {
                format!(
                    "- {}: {} Prefer it for {}.",
                    t.spec.name(),
                    t.spec.description,
                    t.spec.prefer_when
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn catalog_position(id: ToolId) -> usize {
    ToolId::ALL.iter().position(|t| *t == id).unwrap_or(usize::MAX)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
            Ok(arguments.clone())
        }
    }

    fn full_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(ToolId::Gemini, Arc::new(Echo));
        registry.register(ToolId::Sentiment, Arc::new(Echo));
        registry.register(ToolId::Multimodal, Arc::new(Echo));
        registry
    }

    #[test]
    fn test_register_keeps_catalog_order() {
        let registry = full_registry();
        let names: Vec<&str> = registry.tools().map(|t| t.spec.name()).collect();
        assert_eq!(
            names,
            vec!["analyze_sentiment", "analyze_multimodal_content", "process_with_gemini"]
        );
    }

    #[test]
    fn test_register_replaces_binding() {
        let mut registry = full_registry();
        registry.register(ToolId::Sentiment, Arc::new(Echo));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_lookup_unknown_and_unbound() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolId::Sentiment, Arc::new(Echo));

        assert!(registry.lookup("analyze_sentiment").is_ok());
        let unknown = registry.lookup("send_email").unwrap_err();
        assert!(unknown.to_string().contains("unknown tool"));
        assert!(matches!(
            registry.lookup("process_with_gemini"),
            Err(ToolError::UnknownTool { .. })
        ));
    }

    #[test]
    fn test_validate_arguments() {
        let spec = ToolId::Sentiment.spec();
        assert!(ToolRegistry::validate_arguments(&spec, &json!({"text": "hi"})).is_ok());

        let err = ToolRegistry::validate_arguments(&spec, &json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required field: 'text'"));

        assert!(ToolRegistry::validate_arguments(&spec, &json!({"text": null})).is_err());
        assert!(ToolRegistry::validate_arguments(&spec, &json!("text")).is_err());

        let multimodal = ToolId::Multimodal.spec();
        assert!(ToolRegistry::validate_arguments(&multimodal, &json!({})).is_ok());
    }

    #[test]
    fn test_capability_summary_lists_preferences() {
        let summary = full_registry().capability_summary();
        assert_eq!(summary.lines().count(), 3);
        assert!(summary.contains("- analyze_sentiment:"));
        assert!(summary.contains("Prefer it for"));
        assert!(ToolRegistry::new().capability_summary().contains("No tools"));
    }

    #[test]
    fn test_tool_definitions() {
        let defs = full_registry().tool_definitions();
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[2].function.parameters["required"], json!(["prompt"]));
    }
}
