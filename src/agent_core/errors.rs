//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;
use crate::tools::ToolError;

/// Errors that can occur during agent core operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The selection capability was unreachable or answered with something
    /// that could not be turned into a direct answer or invocation list.
    #[error("tool selection failed: {reason}")]
    SelectionFailed { reason: String },

    /// Database operation failed.
    #[error("database error: {reason}")]
    DatabaseError { reason: String },

    /// Serialization error.
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    /// Uploaded file has an extension outside the accepted set.
    #[error("unsupported upload '{file_name}': accepted types are {accepted}")]
    UnsupportedUpload { file_name: String, accepted: String },

    /// Filesystem error while handling an upload.
    #[error("io error: {reason}")]
    IoError { reason: String },

    /// Configuration could not be found, read, or parsed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

impl From<rusqlite::Error> for AgentError {
    fn from(e: rusqlite::Error) -> Self {
        AgentError::DatabaseError {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::SerializationError {
            reason: e.to_string(),
        }
    }
}

impl From<std::io::Error> for AgentError {
    fn from(e: std::io::Error) -> Self {
        AgentError::IoError {
            reason: e.to_string(),
        }
    }
}

/// Tool construction only fails on bad endpoint settings.
impl From<ToolError> for AgentError {
    fn from(e: ToolError) -> Self {
        AgentError::ConfigError {
            reason: e.to_string(),
        }
    }
}

impl From<InferenceError> for AgentError {
    fn from(e: InferenceError) -> Self {
        match e {
            InferenceError::ConfigError { reason } => AgentError::ConfigError { reason },
            other => AgentError::SelectionFailed {
                reason: other.to_string(),
            },
        }
    }
}
