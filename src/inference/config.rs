//! Model configuration and fallback-chain resolution.
//!
//! The `models` section of the agent config is the single source of truth
//! for model endpoints, sampling defaults, and fallback order.

use std::collections::HashMap;

use serde::Deserialize;

use super::errors::InferenceError;

/// Reserved fallback-chain entry; never resolved to a model.
pub const STATIC_RESPONSE_KEY: &str = "static_response";

/// A single model's endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub display_name: String,
    /// Name sent in the request body. Defaults to the model key.
    #[serde(default)]
    pub model_name: Option<String>,
    /// Base URL up to (not including) `/chat/completions`.
    pub base_url: String,
    /// Bearer token. Empty or absent means no `Authorization` header.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_request_timeout_secs() -> u64 {
    60
}

/// Top-level model registry.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub active_model: String,
    pub models: HashMap<String, ModelConfig>,
    #[serde(default)]
    pub fallback_chain: Vec<String>,
}

impl ModelsConfig {
    /// The ordered list of model keys to try, starting with `first`.
    ///
    /// `first` is followed by the fallback chain (minus duplicates and the
    /// static-response marker). Keys not present in `models` are skipped.
    pub fn attempt_order(&self, first: &str) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        let candidates = std::iter::once(first).chain(self.fallback_chain.iter().map(String::as_str));
        for key in candidates {
            if key == STATIC_RESPONSE_KEY || order.iter().any(|k| k == key) {
                continue;
            }
            if self.models.contains_key(key) {
                order.push(key.to_string());
            }
        }
        order
    }
}

/// Resolve the active model configuration, respecting the fallback chain.
///
/// Returns `(model_key, ModelConfig)` for the first model that exists in the
/// config. Actual connectivity is checked at request time by the client.
pub fn resolve_active_model(
    config: &ModelsConfig,
) -> Result<(String, ModelConfig), InferenceError> {
    if let Some(model) = config.models.get(&config.active_model) {
        return Ok((config.active_model.clone(), model.clone()));
    }

    for key in &config.fallback_chain {
        if key == STATIC_RESPONSE_KEY {
            continue;
        }
        if let Some(model) = config.models.get(key) {
            return Ok((key.clone(), model.clone()));
        }
    }

    Err(InferenceError::ConfigError {
        reason: format!(
            "active model '{}' not found in config and no fallback available",
            config.active_model
        ),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
