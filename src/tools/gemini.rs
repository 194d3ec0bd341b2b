//! `process_with_gemini`: general multimodal generation.
//!
//! The content type is inferred from the file extension and routed to a
//! processor kind; the file travels inline (base64) in a single
//! `generateContent` request.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

use super::errors::ToolError;
use super::types::Tool;
use crate::config::GeminiConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SERVICE: &str = "gemini";

// ─── Content routing ─────────────────────────────────────────────────────────

/// Processor families, each owning a set of MIME types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
}

impl ContentKind {
    fn supported_types(self) -> &'static [&'static str] {
        match self {
            ContentKind::Text => &["text/plain"],
            ContentKind::Image => &["image/jpeg", "image/png", "image/gif"],
            ContentKind::Audio => &["audio/mpeg", "audio/wav", "audio/x-wav"],
            ContentKind::Video => &["video/mp4", "video/mpeg", "video/quicktime"],
            ContentKind::Document => &["application/pdf"],
        }
    }

    /// The processor that handles `content_type`, if any.
    pub fn for_content_type(content_type: &str) -> Option<Self> {
        [
            ContentKind::Text,
            ContentKind::Image,
            ContentKind::Audio,
            ContentKind::Video,
            ContentKind::Document,
        ]
        .into_iter()
        .find(|kind| kind.supported_types().contains(&content_type))
    }
}

/// Guess a MIME type from the file extension. No file means plain text.
pub fn content_type_for(file_path: Option<&str>) -> &'static str {
    let Some(path) = file_path else {
        return "text/plain";
    };
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "mpeg" | "mpg" => "video/mpeg",
        "mov" => "video/quicktime",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ─── GeminiTool ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GeminiTool {
    http: HttpClient,
    config: GeminiConfig,
}

impl GeminiTool {
    pub fn new(config: GeminiConfig) -> Result<Self, ToolError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ToolError::RequestFailed {
                service: SERVICE.into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, config })
    }

    /// Build the `contents` parts: the prompt, then the file inline.
    async fn build_parts(
        &self,
        prompt: &str,
        file_path: Option<&str>,
    ) -> Result<Vec<Value>, ToolError> {
        let content_type = content_type_for(file_path);
        let kind = ContentKind::for_content_type(content_type).ok_or_else(|| {
            ToolError::UnsupportedContentType {
                content_type: content_type.to_string(),
            }
        })?;

        let mut parts = vec![json!({ "text": prompt })];
        let Some(path) = file_path else {
            return Ok(parts);
        };

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::FileNotFound {
                    path: path.to_string(),
                }
            } else {
                ToolError::from(e)
            }
        })?;

        tracing::debug!(path, content_type, kind = ?kind, size = bytes.len(), "attaching file");
        parts.push(json!({
            "inline_data": {
                "mime_type": content_type,
                "data": base64::engine::general_purpose::STANDARD.encode(bytes),
            }
        }));
        Ok(parts)
    }

    async fn generate(&self, parts: Vec<Value>) -> Result<String, ToolError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ToolError::NotConfigured {
                service: SERVICE.into(),
            })?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&json!({ "contents": [{ "parts": parts }] }))
            .send()
            .await
            .map_err(|e| ToolError::RequestFailed {
                service: SERVICE.into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::HttpError {
                service: SERVICE.into(),
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::MalformedResponse {
                service: SERVICE.into(),
                reason: e.to_string(),
            })?;

        candidate_text(&body).ok_or_else(|| ToolError::MalformedResponse {
            service: SERVICE.into(),
            reason: format!("no candidate text in response: {body}"),
        })
    }
}

/// Concatenate the text parts of the first candidate.
fn candidate_text(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl Tool for GeminiTool {
    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let prompt = arguments
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "process_with_gemini".into(),
                reason: "'prompt' must be a string".into(),
            })?;
        let file_path = arguments
            .get("file_path")
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty());

        let parts = self.build_parts(prompt, file_path).await?;
        let text = self.generate(parts).await?;
        Ok(Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;

    fn tool(server: &MockServer) -> GeminiTool {
        GeminiTool::new(GeminiConfig {
            base_url: server.base_url(),
            api_key: Some("g-test".into()),
            model: "gemini-1.5-flash".into(),
        })
        .unwrap()
    }

    #[test]
    fn test_content_type_inference() {
        assert_eq!(content_type_for(None), "text/plain");
        assert_eq!(content_type_for(Some("/tmp/a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Some("clip.mov")), "video/quicktime");
        assert_eq!(content_type_for(Some("song.mp3")), "audio/mpeg");
        assert_eq!(content_type_for(Some("paper.pdf")), "application/pdf");
        assert_eq!(content_type_for(Some("archive.zip")), "application/octet-stream");
    }

    #[test]
    fn test_processor_routing() {
        assert_eq!(ContentKind::for_content_type("audio/x-wav"), Some(ContentKind::Audio));
        assert_eq!(ContentKind::for_content_type("application/pdf"), Some(ContentKind::Document));
        assert_eq!(ContentKind::for_content_type("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn test_text_prompt() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-1.5-flash:generateContent")
                .header("x-goog-api-key", "g-test")
                .json_body(json!({"contents": [{"parts": [{"text": "write a haiku"}]}]}));
            then.status(200).json_body(json!({
                "candidates": [{"content": {"parts": [{"text": "old pond"}, {"text": " / frog"}]}}]
            }));
        });

        let result = tool(&server)
            .execute(&json!({"prompt": "write a haiku"}))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(result, json!("old pond / frog"));
    }

    #[tokio::test]
    async fn test_image_is_sent_inline() {
        let server = MockServer::start();
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"GIF89a");
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-1.5-flash:generateContent")
                .body_contains("\"mime_type\":\"image/gif\"")
                .body_contains(&encoded);
            then.status(200).json_body(json!({
                "candidates": [{"content": {"parts": [{"text": "a tiny gif"}]}}]
            }));
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let result = tool(&server)
            .execute(&json!({"prompt": "describe", "file_path": path.to_string_lossy()}))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(result, json!("a tiny gif"));
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let server = MockServer::start();
        let err = tool(&server)
            .execute(&json!({"prompt": "describe", "file_path": "/nope/x.png"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let server = MockServer::start();
        let err = tool(&server)
            .execute(&json!({"prompt": "unzip", "file_path": "/tmp/data.zip"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported content type: application/octet-stream");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let gemini = GeminiTool::new(GeminiConfig::default()).unwrap();
        let err = gemini.execute(&json!({"prompt": "hi"})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotConfigured { .. }));
    }
}
