//! Tool error types.

use thiserror::Error;

/// Errors that can occur while resolving or running a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool name is not in the closed catalog.
    #[error("unknown tool: '{name}'")]
    UnknownTool { name: String },

    /// Tool call arguments failed validation.
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The tool needs a file that does not exist.
    #[error("file not found: '{path}'")]
    FileNotFound { path: String },

    /// No processor handles the file's content type.
    #[error("Unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    /// The tool's backing service has no endpoint configured.
    #[error("service '{service}' is not configured")]
    NotConfigured { service: String },

    /// Could not reach the backing service.
    #[error("request to '{service}' failed: {reason}")]
    RequestFailed { service: String, reason: String },

    /// The backing service answered with a non-success status.
    #[error("service '{service}' returned HTTP {status}: {body}")]
    HttpError {
        service: String,
        status: u16,
        body: String,
    },

    /// The backing service answered with an unexpected payload.
    #[error("unexpected response from '{service}': {reason}")]
    MalformedResponse { service: String, reason: String },

    /// Filesystem error while reading tool input.
    #[error("io error: {reason}")]
    IoError { reason: String },
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError::IoError {
            reason: e.to_string(),
        }
    }
}
