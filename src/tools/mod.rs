//! Tools: the closed catalog of analysis tools and their HTTP adapters.
//!
//! The registry is built once at startup from the `tools` config section and
//! shared read-only by the selector (schemas) and the executor (dispatch).

pub mod errors;
pub mod gemini;
pub mod http;
pub mod multimodal;
pub mod registry;
pub mod sentiment;
pub mod types;

use std::sync::Arc;

pub use errors::ToolError;
pub use registry::{RegisteredTool, ToolRegistry};
pub use types::{Tool, ToolId, ToolSpec};

use crate::config::ToolsConfig;
use gemini::GeminiTool;
use http::EndpointClient;
use multimodal::MultimodalTool;
use sentiment::SentimentTool;

/// Bind every catalog entry to its HTTP-backed implementation.
pub fn build_registry(config: &ToolsConfig) -> Result<ToolRegistry, ToolError> {
    let sentiment = SentimentTool::new(EndpointClient::new("sentiment", &config.sentiment)?);
    let multimodal = MultimodalTool::new(
        sentiment.clone(),
        EndpointClient::new("image_classification", &config.image_classification)?,
        EndpointClient::new("translation", &config.translation)?,
    );
    let gemini = GeminiTool::new(config.gemini.clone())?;

    let mut registry = ToolRegistry::new();
    registry.register(ToolId::Sentiment, Arc::new(sentiment));
    registry.register(ToolId::Multimodal, Arc::new(multimodal));
    registry.register(ToolId::Gemini, Arc::new(gemini));

    tracing::info!(tool_count = registry.len(), "tool registry built");
    Ok(registry)
}
