//! `analyze_multimodal_content`: sentiment, image classification and
//! translation in one call.
//!
//! Sentiment failures fail the tool. Image classification and translation
//! failures are recorded under `*_error` keys so the other parts survive.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::errors::ToolError;
use super::http::{classification_labels, EndpointClient};
use super::sentiment::SentimentTool;
use super::types::Tool;

const DEFAULT_SOURCE_LANG: &str = "en";
const DEFAULT_TARGET_LANG: &str = "fr";

#[derive(Debug, Clone)]
pub struct MultimodalTool {
    sentiment: SentimentTool,
    image_classifier: EndpointClient,
    translator: EndpointClient,
}

impl MultimodalTool {
    pub fn new(
        sentiment: SentimentTool,
        image_classifier: EndpointClient,
        translator: EndpointClient,
    ) -> Self {
        Self {
            sentiment,
            image_classifier,
            translator,
        }
    }

    async fn classify_image(&self, file_path: &str) -> Result<Value, ToolError> {
        let bytes = tokio::fs::read(file_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::FileNotFound {
                    path: file_path.to_string(),
                }
            } else {
                ToolError::from(e)
            }
        })?;

        let body = self.image_classifier.post_bytes(bytes).await?;
        let labels: Vec<Value> = classification_labels(&body)
            .into_iter()
            .map(|(label, score)| json!({ "label": label, "score": score }))
            .collect();

        if labels.is_empty() {
            return Err(ToolError::MalformedResponse {
                service: "image_classification".into(),
                reason: format!("no labels in response: {body}"),
            });
        }
        Ok(Value::Array(labels))
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, ToolError> {
        let body = self
            .translator
            .post_json(&json!({
                "inputs": text,
                "parameters": { "src_lang": source, "tgt_lang": target }
            }))
            .await?;

        translation_text(&body).ok_or_else(|| ToolError::MalformedResponse {
            service: "translation".into(),
            reason: format!("no translation_text in response: {body}"),
        })
    }
}

/// Pull the translated string out of `[{"translation_text": ...}]`.
fn translation_text(body: &Value) -> Option<String> {
    let first = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    first
        .get("translation_text")
        .and_then(Value::as_str)
        .map(String::from)
}

/// Non-empty string argument, if present.
fn str_arg<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[async_trait]
impl Tool for MultimodalTool {
    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let text = str_arg(arguments, "text");
        let file_path = str_arg(arguments, "file_path");
        let source = str_arg(arguments, "translate_source_lang").unwrap_or(DEFAULT_SOURCE_LANG);
        let target = str_arg(arguments, "translate_target_lang").unwrap_or(DEFAULT_TARGET_LANG);

        let mut results = Map::new();

        if let Some(text) = text {
            let sentiment = self.sentiment.analyze(text).await?;
            results.insert("sentiment_analysis".into(), sentiment);
        }

        if let Some(path) = file_path {
            match self.classify_image(path).await {
                Ok(labels) => {
                    results.insert("image_classification".into(), labels);
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "image classification failed");
                    results.insert("image_classification_error".into(), json!(e.to_string()));
                }
            }
        }

        if let Some(text) = text {
            match self.translate(text, source, target).await {
                Ok(translated) => {
                    results.insert("translation".into(), json!(translated));
                }
                Err(e) => {
                    tracing::warn!(source, target, error = %e, "translation failed");
                    results.insert("translation_error".into(), json!(e.to_string()));
                }
            }
        }

        Ok(Value::Object(results))
    }
}
