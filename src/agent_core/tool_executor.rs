//! Tool execution with per-invocation failure isolation.
//!
//! Every invocation produces exactly one [`ToolOutcome`]. Unknown names,
//! invalid arguments, tool errors, timeouts and panics all become
//! `Failure` outcomes; nothing here aborts a sibling invocation or the turn.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::Value;

use super::types::{Invocation, ToolOutcome};
use crate::tools::{RegisteredTool, ToolRegistry, ToolSpec};

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one invocation against the catalog.
    pub async fn execute(&self, invocation: Invocation, file_reference: Option<&str>) -> ToolOutcome {
        self.dispatch(invocation, file_reference).resolve().await
    }

    /// Execute all invocations concurrently and return outcomes in request
    /// order, after every invocation has finished.
    ///
    /// Dropping the returned future aborts the tool tasks still running.
    pub async fn execute_all(
        &self,
        invocations: Vec<Invocation>,
        file_reference: Option<&str>,
    ) -> Vec<ToolOutcome> {
        let pending: Vec<Pending> = invocations
            .into_iter()
            .map(|invocation| self.dispatch(invocation, file_reference))
            .collect();
        join_all(pending.into_iter().map(Pending::resolve)).await
    }

    /// Spawn the invocation on its own task, or resolve it immediately when
    /// the name is outside the catalog.
    fn dispatch(&self, invocation: Invocation, file_reference: Option<&str>) -> Pending {
        let tool = match self.registry.lookup(&invocation.tool_name) {
            Ok(tool) => tool.clone(),
            Err(e) => return Pending::Done(unknown_tool(invocation, e.to_string())),
        };

        let tool_name = invocation.tool_name.clone();
        let arguments = invocation.arguments.clone();
        let file = file_reference.map(String::from);
        let timeout = self.timeout;
        let handle = tokio::spawn(async move {
            run_tool(tool, invocation, file.as_deref(), timeout).await
        });
        Pending::Running {
            tool_name,
            arguments,
            task: AbortOnDrop(handle),
        }
    }
}

/// Aborts the task when dropped, so an abandoned turn does not leave tool
/// calls running in the background.
struct AbortOnDrop(tokio::task::JoinHandle<ToolOutcome>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// An invocation that is either already resolved or still running.
enum Pending {
    Done(ToolOutcome),
    Running {
        tool_name: String,
        arguments: Value,
        task: AbortOnDrop,
    },
}

impl Pending {
    async fn resolve(self) -> ToolOutcome {
        match self {
            Pending::Done(outcome) => outcome,
            Pending::Running {
                tool_name,
                arguments,
                mut task,
            } => match (&mut task.0).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(tool = %tool_name, error = %e, "tool task aborted");
                    ToolOutcome::Failure {
                        tool_name,
                        arguments,
                        error_message: format!("tool task aborted: {e}"),
                    }
                }
            },
        }
    }
}

fn unknown_tool(invocation: Invocation, message: String) -> ToolOutcome {
    tracing::warn!(tool = %invocation.tool_name, "selector requested unknown tool");
    ToolOutcome::Failure {
        tool_name: invocation.tool_name,
        arguments: invocation.arguments,
        error_message: message,
    }
}

/// Overlay the file reference onto the tool's file parameter.
///
/// A resolved reference always wins over whatever the model supplied, so the
/// tool runs against the session's active file. Without a reference the
/// model's value is left as is.
pub fn resolve_arguments(spec: &ToolSpec, arguments: Value, file_reference: Option<&str>) -> Value {
    let (Some(param), Some(file)) = (spec.file_param, file_reference) else {
        return arguments;
    };
    match arguments {
        Value::Object(mut map) => {
            map.insert(param.to_string(), Value::String(file.to_string()));
            Value::Object(map)
        }
        Value::Null => {
            let mut map = serde_json::Map::new();
            map.insert(param.to_string(), Value::String(file.to_string()));
            Value::Object(map)
        }
        other => other,
    }
}

async fn run_tool(
    tool: RegisteredTool,
    invocation: Invocation,
    file_reference: Option<&str>,
    timeout: Duration,
) -> ToolOutcome {
    let start = Instant::now();
    let tool_name = invocation.tool_name;
    let arguments = resolve_arguments(&tool.spec, invocation.arguments, file_reference);

    if let Err(e) = ToolRegistry::validate_arguments(&tool.spec, &arguments) {
        tracing::warn!(tool = %tool_name, error = %e, "tool arguments rejected");
        return ToolOutcome::Failure {
            tool_name,
            arguments,
            error_message: e.to_string(),
        };
    }

    let result = tokio::time::timeout(timeout, tool.implementation.execute(&arguments)).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(value)) => {
            tracing::info!(tool = %tool_name, elapsed_ms, success = true, "tool executed");
            ToolOutcome::Success {
                tool_name,
                arguments,
                result: value,
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(tool = %tool_name, elapsed_ms, success = false, error = %e, "tool failed");
            ToolOutcome::Failure {
                tool_name,
                arguments,
                error_message: e.to_string(),
            }
        }
        Err(_) => {
            tracing::warn!(tool = %tool_name, elapsed_ms, success = false, "tool timed out");
            ToolOutcome::Failure {
                error_message: format!("tool '{tool_name}' timed out after {timeout:?}"),
                tool_name,
                arguments,
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
