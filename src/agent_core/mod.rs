//! Agent Core: the per-turn orchestration loop.
//!
//! Submodules:
//! - `query_parser`: Splits `file: ... | query: ...` input into query and file marker
//! - `tool_selector`: Asks the model for a direct answer or tool invocations
//! - `tool_executor`: Runs invocations concurrently, one outcome per invocation
//! - `response_synthesizer`: Summarizes outcomes, with a deterministic fallback
//! - `conversation_log`: SQLite audit log of completed turns
//! - `session`: Turn state machine, file reference and history
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod conversation_log;
pub mod errors;
pub mod query_parser;
pub mod response_synthesizer;
pub mod session;
pub mod tool_executor;
pub mod tool_selector;
pub mod types;

// Re-exports for convenience
pub use conversation_log::ConversationLog;
pub use errors::AgentError;
pub use response_synthesizer::ResponseSynthesizer;
pub use session::{AgentSession, Clock, SessionSettings, ACCEPTED_UPLOADS};
pub use tool_executor::ToolExecutor;
pub use tool_selector::{HistoryTurn, ToolSelector};
pub use types::{
    ConversationEntry, FileReference, Invocation, ParsedInput, SelectorOutcome, ToolOutcome,
    TurnPhase,
};
