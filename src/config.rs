//! Application configuration.
//!
//! One YAML file holds the model registry, agent settings and tool
//! endpoints. String values may reference the environment as `${VAR}` or
//! `${VAR:-default}`; a default starting with `~` is expanded to the home
//! directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::agent_core::errors::AgentError;
use crate::inference::ModelsConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "MULTITOOL_AGENT_CONFIG";

/// Relative location searched for when no explicit path is given.
const CONFIG_RELATIVE_PATH: &str = "config/agent.yaml";

// ─── Types ───────────────────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Orchestration settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    /// Model key used for tool selection. Defaults to the active model.
    #[serde(default)]
    pub selector_model: Option<String>,
    /// Model key used for response synthesis. Defaults to the active model.
    #[serde(default)]
    pub synthesizer_model: Option<String>,
    /// Number of prior (query, answer) pairs passed to the selector.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    /// Upper bound on a single tool execution.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// SQLite conversation log. Defaults to `<data_dir>/conversations.db`.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Where uploaded files are stored. Defaults to `<data_dir>/uploads`.
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,
}

fn default_history_turns() -> usize {
    6
}
fn default_tool_timeout_secs() -> u64 {
    120
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            selector_model: None,
            synthesizer_model: None,
            history_turns: default_history_turns(),
            tool_timeout_secs: default_tool_timeout_secs(),
            log_path: None,
            uploads_dir: None,
        }
    }
}

/// An HTTP inference endpoint for one tool backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Gemini `generateContent` settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            api_key: None,
            model: default_gemini_model(),
        }
    }
}

/// Endpoints for the concrete tools.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub sentiment: EndpointConfig,
    #[serde(default)]
    pub image_classification: EndpointConfig,
    #[serde(default)]
    pub translation: EndpointConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// Order: the explicit path, then `MULTITOOL_AGENT_CONFIG`, then an upward
/// search from `start` for `config/agent.yaml`.
pub fn find_config_path(explicit: Option<&Path>, start: &Path) -> Result<PathBuf, AgentError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(AgentError::ConfigError {
            reason: format!("config file not found: {}", path.display()),
        });
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Ok(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{CONFIG_ENV_VAR} points at a missing file");
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_RELATIVE_PATH);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(AgentError::ConfigError {
        reason: format!("could not find {CONFIG_RELATIVE_PATH}"),
    })
}

/// Load and parse a config file.
pub fn load_config(path: &Path) -> Result<AppConfig, AgentError> {
    let raw = std::fs::read_to_string(path).map_err(|e| AgentError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;
    parse_config(&raw)
}

/// Parse config text after environment interpolation.
pub fn parse_config(raw: &str) -> Result<AppConfig, AgentError> {
    let interpolated = interpolate_env_vars(raw);
    serde_yaml::from_str(&interpolated).map_err(|e| AgentError::ConfigError {
        reason: format!("failed to parse config: {e}"),
    })
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let expr: String = chars.by_ref().take_while(|c| *c != '}').collect();
            result.push_str(&resolve_var_expr(&expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve `VAR` or `VAR:-default`. Unset without default is empty.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
active_model: gpt-4o
models:
  gpt-4o:
    display_name: "GPT-4o"
    base_url: "https://api.openai.com/v1"
    api_key: "${__MTA_TEST_OPENAI_KEY__:-sk-default}"
fallback_chain: [gpt-4o, static_response]
agent:
  history_turns: 2
tools:
  sentiment:
    endpoint: "http://localhost:9000/sentiment"
"#;

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__MTA_TEST_MISSING__");
        assert_eq!(
            interpolate_env_vars("${__MTA_TEST_MISSING__:-/fallback/path}"),
            "/fallback/path"
        );
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__MTA_TEST_SET__", "/custom/path");
        assert_eq!(
            interpolate_env_vars("dir: ${__MTA_TEST_SET__:-/fallback}/x"),
            "dir: /custom/path/x"
        );
        std::env::remove_var("__MTA_TEST_SET__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with $dollar but no braces";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/uploads");
        assert!(!result.starts_with('~'));
        assert!(result.ends_with("/uploads"));
    }

    #[test]
    fn test_parse_config_applies_defaults() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.models.active_model, "gpt-4o");
        assert_eq!(
            cfg.models.models["gpt-4o"].api_key.as_deref(),
            Some("sk-default")
        );
        assert_eq!(cfg.agent.history_turns, 2);
        assert_eq!(cfg.agent.tool_timeout_secs, 120);
        assert!(cfg.agent.selector_model.is_none());
        assert_eq!(cfg.tools.sentiment.endpoint, "http://localhost:9000/sentiment");
        assert!(cfg.tools.translation.endpoint.is_empty());
        assert_eq!(cfg.tools.gemini.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_parse_config_rejects_garbage() {
        let err = parse_config("active_model: [unterminated").unwrap_err();
        assert!(matches!(err, AgentError::ConfigError { .. }));
    }

    #[test]
    fn test_find_config_path_searches_upward() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("config")).unwrap();
        std::fs::write(root.path().join(CONFIG_RELATIVE_PATH), SAMPLE).unwrap();
        let nested = root.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config_path(None, &nested).unwrap();
        assert_eq!(found, root.path().join(CONFIG_RELATIVE_PATH));

        let loaded = load_config(&found).unwrap();
        assert_eq!(loaded.models.fallback_chain.len(), 2);
    }

    #[test]
    fn test_find_config_path_explicit_missing() {
        let err = find_config_path(Some(Path::new("/definitely/not/here.yaml")), Path::new("/"))
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
