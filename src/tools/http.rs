//! Thin HTTP client for hosted inference endpoints.
//!
//! Sentiment, image classification and translation each sit behind a
//! Hugging Face style endpoint: POST a JSON (or raw bytes) payload, get JSON
//! back, authenticate with an optional bearer token.

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde_json::Value;

use super::errors::ToolError;
use crate::config::EndpointConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// One configured inference endpoint.
#[derive(Debug, Clone)]
pub struct EndpointClient {
    service: &'static str,
    http: HttpClient,
    endpoint: String,
    api_key: Option<String>,
}

impl EndpointClient {
    pub fn new(service: &'static str, config: &EndpointConfig) -> Result<Self, ToolError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ToolError::RequestFailed {
                service: service.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            service,
            http,
            endpoint: config.endpoint.trim().to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    /// POST a JSON payload.
    pub async fn post_json(&self, payload: &Value) -> Result<Value, ToolError> {
        let request = self.request()?.json(payload);
        self.send(request).await
    }

    /// POST raw bytes (image classification takes the file body directly).
    pub async fn post_bytes(&self, bytes: Vec<u8>) -> Result<Value, ToolError> {
        let request = self
            .request()?
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes);
        self.send(request).await
    }

    fn request(&self) -> Result<reqwest::RequestBuilder, ToolError> {
        if self.endpoint.is_empty() {
            return Err(ToolError::NotConfigured {
                service: self.service.to_string(),
            });
        }
        let mut request = self.http.post(&self.endpoint);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        Ok(request)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, ToolError> {
        let response = request.send().await.map_err(|e| ToolError::RequestFailed {
            service: self.service.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::HttpError {
                service: self.service.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ToolError::MalformedResponse {
                service: self.service.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Flatten a classification response to `(label, score)` pairs.
///
/// Endpoints answer either `[{label, score}, ...]` or, for batched text
/// input, `[[{label, score}, ...]]`.
pub fn classification_labels(body: &Value) -> Vec<(String, f64)> {
    let items: Vec<&Value> = match body.as_array() {
        Some(outer) if outer.first().map(Value::is_array).unwrap_or(false) => outer
            .iter()
            .filter_map(Value::as_array)
            .flatten()
            .collect(),
        Some(outer) => outer.iter().collect(),
        None => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| {
            let label = item.get("label")?.as_str()?.to_string();
            let score = item.get("score").and_then(Value::as_f64).unwrap_or(0.0);
            Some((label, score))
        })
        .collect()
}
