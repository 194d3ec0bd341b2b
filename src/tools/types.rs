//! Tool identifiers, catalog specs and the tool capability trait.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::errors::ToolError;
use crate::inference::ToolDefinition;

// ─── Tool capability ─────────────────────────────────────────────────────────

/// A callable tool. Every catalog entry binds one [`ToolId`] to one of these.
///
/// Implementations report failures as [`ToolError`]; the executor turns them
/// into failure outcomes so a broken tool never takes its siblings down.
#[async_trait]
pub trait Tool: Send + Sync {
    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError>;
}

// ─── ToolId ──────────────────────────────────────────────────────────────────

/// The closed set of tools the agent can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    Sentiment,
    Multimodal,
    Gemini,
}

impl ToolId {
    /// Every tool, in catalog order.
    pub const ALL: [ToolId; 3] = [ToolId::Sentiment, ToolId::Multimodal, ToolId::Gemini];

    /// The name the language model uses to request this tool.
    pub fn name(self) -> &'static str {
        match self {
            ToolId::Sentiment => "analyze_sentiment",
            ToolId::Multimodal => "analyze_multimodal_content",
            ToolId::Gemini => "process_with_gemini",
        }
    }

    /// Resolve a requested tool name. Unknown names are rejected, never guessed.
    pub fn from_name(name: &str) -> Result<Self, ToolError> {
        Self::ALL
            .into_iter()
            .find(|id| id.name() == name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    /// Static catalog entry for this tool.
    pub fn spec(self) -> ToolSpec {
        match self {
            ToolId::Sentiment => ToolSpec {
                id: self,
                description: "Analyze the sentiment of a given text and return the sentiment \
                              score and label.",
                prefer_when: "the task is only sentiment of a piece of text; prefer this over \
                              process_with_gemini for plain sentiment",
                file_param: None,
                required: &["text"],
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "text": {
                            "type": "string",
                            "description": "The text to analyze for sentiment."
                        }
                    },
                    "required": ["text"]
                }),
            },
            ToolId::Multimodal => ToolSpec {
                id: self,
                description: "Analyze text sentiment, classify an image, and translate text \
                              to a target language.",
                prefer_when: "basic image classification, or translating text to French",
                file_param: Some("file_path"),
                required: &[],
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "text": {
                            "type": "string",
                            "description": "The text to analyze for sentiment or translate."
                        },
                        "file_path": {
                            "type": "string",
                            "description": "The path to the image file for classification."
                        },
                        "translate_source_lang": {
                            "type": "string",
                            "description": "The source language for translation (e.g. 'en').",
                            "default": "en"
                        },
                        "translate_target_lang": {
                            "type": "string",
                            "description": "The target language for translation (e.g. 'fr').",
                            "default": "fr"
                        }
                    },
                    "required": []
                }),
            },
            ToolId::Gemini => ToolSpec {
                id: self,
                description: "Advanced question answering, text analysis, image, video and \
                              audio understanding, document extraction, multi-language \
                              translation and content generation.",
                prefer_when: "advanced image, video, audio or document understanding, \
                              translation into languages other than French, or content \
                              generation",
                file_param: Some("file_path"),
                required: &["prompt"],
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "prompt": {
                            "type": "string",
                            "description": "The prompt or query to process."
                        },
                        "file_path": {
                            "type": "string",
                            "description": "Path to the file to be processed (image, audio, \
                                            video, or document), if available."
                        },
                        "file_type": {
                            "type": "string",
                            "description": "Type of file.",
                            "enum": ["text", "image", "audio", "video", "document"]
                        }
                    },
                    "required": ["prompt"]
                }),
            },
        }
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── ToolSpec ────────────────────────────────────────────────────────────────

/// Declared contract for one tool: schema, file parameter, selection hint.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub id: ToolId,
    pub description: &'static str,
    /// When the selector should pick this tool over the others.
    pub prefer_when: &'static str,
    /// Argument that receives the session's file reference, if any.
    pub file_param: Option<&'static str>,
    pub required: &'static [&'static str],
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

impl ToolSpec {
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// OpenAI function-calling definition for this tool.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description, self.parameters.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_round_trips_every_tool() {
        for id in ToolId::ALL {
            assert_eq!(ToolId::from_name(id.name()).unwrap(), id);
        }
    }

    #[test]
    fn test_from_name_unknown() {
        let err = ToolId::from_name("delete_everything").unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[test]
    fn test_spec_required_matches_schema() {
        for id in ToolId::ALL {
            let spec = id.spec();
            let schema_required: Vec<&str> = spec.parameters["required"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(|v| v.as_str())
                .collect();
            assert_eq!(schema_required, spec.required, "{id}");
            if let Some(param) = spec.file_param {
                assert!(spec.parameters["properties"].get(param).is_some());
            }
        }
    }

    #[test]
    fn test_to_definition() {
        let def = ToolId::Gemini.spec().to_definition();
        assert_eq!(def.r#type, "function");
        assert_eq!(def.function.name, "process_with_gemini");
    }
}
