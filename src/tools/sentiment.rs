//! `analyze_sentiment`: three-way text sentiment.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::errors::ToolError;
use super::http::{classification_labels, EndpointClient};
use super::types::Tool;

/// Sentiment classifier behind a text-classification endpoint.
///
/// The model emits `LABEL_0..2`; those map to a score in `-1..=1` and a
/// readable label. Anything else is read as neutral.
#[derive(Debug, Clone)]
pub struct SentimentTool {
    client: EndpointClient,
}

impl SentimentTool {
    pub fn new(client: EndpointClient) -> Self {
        Self { client }
    }

    /// Classify `text` and return `{sentiment_score, sentiment_label}`.
    pub async fn analyze(&self, text: &str) -> Result<Value, ToolError> {
        let body = self.client.post_json(&json!({ "inputs": text })).await?;

        let top = classification_labels(&body)
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| ToolError::MalformedResponse {
                service: "sentiment".into(),
                reason: format!("no labels in response: {body}"),
            })?;

        let (score, label) = label_to_sentiment(&top.0);
        Ok(json!({
            "sentiment_score": score,
            "sentiment_label": label,
        }))
    }
}

/// Map a raw model label to `(score, label)`.
pub fn label_to_sentiment(label: &str) -> (i64, &'static str) {
    match label {
        "LABEL_0" => (-1, "Negative"),
        "LABEL_1" => (0, "Neutral"),
        "LABEL_2" => (1, "Positive"),
        _ => (0, "Neutral"),
    }
}

#[async_trait]
impl Tool for SentimentTool {
    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "analyze_sentiment".into(),
                reason: "'text' must be a string".into(),
            })?;
        self.analyze(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use httpmock::Method::POST;
    use httpmock::MockServer;

    fn tool(server: &MockServer) -> SentimentTool {
        let config = EndpointConfig {
            endpoint: server.url("/sentiment"),
            api_key: None,
        };
        SentimentTool::new(EndpointClient::new("sentiment", &config).unwrap())
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(label_to_sentiment("LABEL_0"), (-1, "Negative"));
        assert_eq!(label_to_sentiment("LABEL_1"), (0, "Neutral"));
        assert_eq!(label_to_sentiment("LABEL_2"), (1, "Positive"));
        assert_eq!(label_to_sentiment("joy"), (0, "Neutral"));
    }

    #[tokio::test]
    async fn test_execute_picks_top_label() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/sentiment")
                .json_body(json!({"inputs": "what a lovely day"}));
            then.status(200).json_body(json!([[
                {"label": "LABEL_0", "score": 0.02},
                {"label": "LABEL_2", "score": 0.93},
                {"label": "LABEL_1", "score": 0.05}
            ]]));
        });

        let result = tool(&server)
            .execute(&json!({"text": "what a lovely day"}))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(
            result,
            json!({"sentiment_score": 1, "sentiment_label": "Positive"})
        );
    }

    #[tokio::test]
    async fn test_execute_rejects_missing_text() {
        let server = MockServer::start();
        let err = tool(&server).execute(&json!({"text": 7})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_empty_label_list_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/sentiment");
            then.status(200).json_body(json!([]));
        });
        let err = tool(&server).analyze("meh").await.unwrap_err();
        assert!(matches!(err, ToolError::MalformedResponse { .. }));
    }
}
