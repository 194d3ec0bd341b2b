//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests and walks the configured
//! fallback chain when the primary model is unavailable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::capability::ChatCapability;
use super::config::{resolve_active_model, ModelConfig, ModelsConfig};
use super::errors::InferenceError;
use super::response::parse_completion_response;
use super::types::{ChatCompletionRequest, ChatMessage, Completion, ToolDefinition};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for an OpenAI-compatible chat-completion endpoint.
///
/// The client is pinned to a primary model key. Each request starts at the
/// primary model and moves down the fallback chain on retriable errors, so
/// one outage never permanently demotes the client.
pub struct InferenceClient {
    http: HttpClient,
    config: ModelsConfig,
    primary_key: String,
    primary: ModelConfig,
}

impl InferenceClient {
    /// Create a client for the configured active model.
    pub fn from_config(config: ModelsConfig) -> Result<Self, InferenceError> {
        let (key, _) = resolve_active_model(&config)?;
        Self::from_config_with_model(config, &key)
    }

    /// Create a client pinned to a specific model key.
    ///
    /// Used to give tool selection and response synthesis different models.
    pub fn from_config_with_model(
        config: ModelsConfig,
        model_key: &str,
    ) -> Result<Self, InferenceError> {
        let primary = config
            .models
            .get(model_key)
            .ok_or_else(|| InferenceError::ConfigError {
                reason: format!("model '{model_key}' not found in config"),
            })?
            .clone();

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: primary.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            config,
            primary_key: model_key.to_string(),
            primary,
        })
    }

    /// The base URL of the primary model's endpoint.
    pub fn current_base_url(&self) -> &str {
        &self.primary.base_url
    }

    /// Send a chat completion, falling back through the chain on retriable
    /// errors. Non-retriable errors are returned immediately.
    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Completion, InferenceError> {
        let order = self.config.attempt_order(&self.primary_key);
        let mut attempted = Vec::with_capacity(order.len());
        let mut last_error: Option<InferenceError> = None;

        for key in order {
            let Some(model) = self.config.models.get(&key) else {
                continue;
            };
            attempted.push(key.clone());

            match self.try_request(&key, model, &messages, &tools).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retriable() => {
                    tracing::warn!(model = %key, error = %e, "model unavailable, trying fallback");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last_error {
            Some(e) if attempted.len() == 1 => Err(e),
            _ => Err(InferenceError::AllModelsUnavailable { attempted }),
        }
    }

    /// Attempt a single request against one model.
    async fn try_request(
        &self,
        key: &str,
        model: &ModelConfig,
        messages: &[ChatMessage],
        tools: &Option<Vec<ToolDefinition>>,
    ) -> Result<Completion, InferenceError> {
        let url = format!("{}/chat/completions", model.base_url.trim_end_matches('/'));
        let body = ChatCompletionRequest {
            model: model.model_name.clone().unwrap_or_else(|| key.to_string()),
            messages: messages.to_vec(),
            tools: tools.clone(),
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            temperature: model.temperature,
            max_tokens: model.max_tokens,
        };

        // Request metadata only; the body can be large.
        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = body.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "LLM request"
        );

        let mut request = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(model.request_timeout_secs))
            .json(&body);
        if let Some(key) = model.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: model.request_timeout_secs,
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| InferenceError::MalformedResponse {
                reason: format!("failed to read response body: {e}"),
            })?;

        parse_completion_response(&body_text)
    }
}

#[async_trait]
impl ChatCapability for InferenceClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Completion, InferenceError> {
        self.chat_completion(messages, tools).await
    }

    fn model_name(&self) -> &str {
        &self.primary.display_name
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
