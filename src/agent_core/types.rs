//! Shared types for the agent core.
//!
//! Invocations and their outcomes, the session's file reference, the audit
//! record of a completed turn, and the turn state machine.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Parsing ────────────────────────────────────────────────────────────────

/// Result of splitting a combined input line into query and file marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInput {
    pub query: String,
    pub file_reference: Option<String>,
}

// ─── Selection ──────────────────────────────────────────────────────────────

/// A requested tool call: name plus arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub tool_name: String,
    pub arguments: Value,
}

impl Invocation {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// What the selector decided for a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorOutcome {
    /// The model answered without tools; synthesis is skipped.
    Direct { text: String },
    /// Tools to run, in the order the model asked for them.
    Invocations(Vec<Invocation>),
}

// ─── Execution ──────────────────────────────────────────────────────────────

/// The result of executing one invocation.
///
/// Exactly one outcome exists per invocation and carries the same tool name.
/// `arguments` are the resolved arguments (after file overlay).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success {
        tool_name: String,
        arguments: Value,
        result: Value,
    },
    Failure {
        tool_name: String,
        arguments: Value,
        error_message: String,
    },
}

impl ToolOutcome {
    pub fn tool_name(&self) -> &str {
        match self {
            ToolOutcome::Success { tool_name, .. } | ToolOutcome::Failure { tool_name, .. } => {
                tool_name
            }
        }
    }

    pub fn arguments(&self) -> &Value {
        match self {
            ToolOutcome::Success { arguments, .. } | ToolOutcome::Failure { arguments, .. } => {
                arguments
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }
}

// ─── Session state ──────────────────────────────────────────────────────────

/// The session's active file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub path: String,
    pub discovered_at: DateTime<Utc>,
}

impl FileReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            discovered_at: Utc::now(),
        }
    }
}

/// File extension with leading dot, e.g. `".png"`.
pub fn file_type_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    Parsing,
    Selecting,
    Executing,
    Synthesizing,
    Logging,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Parsing => "parsing",
            TurnPhase::Selecting => "selecting",
            TurnPhase::Executing => "executing",
            TurnPhase::Synthesizing => "synthesizing",
            TurnPhase::Logging => "logging",
        }
    }
}

// ─── Audit ──────────────────────────────────────────────────────────────────

/// Durable record of one completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    /// `YYYYMMDD_HHMMSS` of the turn start. Two turns started within the
    /// same second share an id.
    pub conversation_id: String,
    pub user_query: String,
    pub file_path: Option<String>,
    pub tool_outcomes: Vec<ToolOutcome>,
    pub final_response: String,
}

impl ConversationEntry {
    /// Format a turn start time as a conversation id.
    pub fn conversation_id_for(started_at: DateTime<Utc>) -> String {
        started_at.format("%Y%m%d_%H%M%S").to_string()
    }

    pub fn file_type(&self) -> Option<String> {
        self.file_path.as_deref().and_then(file_type_of)
    }

    /// Comma-joined names of the invoked tools, in request order.
    pub fn tool_names(&self) -> String {
        self.tool_outcomes
            .iter()
            .map(ToolOutcome::tool_name)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Per-invocation `{tool_name, arguments}` list.
    pub fn tool_arguments(&self) -> Value {
        Value::Array(
            self.tool_outcomes
                .iter()
                .map(|o| {
                    serde_json::json!({
                        "tool_name": o.tool_name(),
                        "arguments": o.arguments(),
                    })
                })
                .collect(),
        )
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
