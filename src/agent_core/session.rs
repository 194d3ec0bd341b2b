//! AgentSession: drives one turn through parse, select, execute,
//! synthesize and log, and owns the state that survives across turns.
//!
//! Turns are serialized per session. The file reference and conversation
//! history are snapshotted at turn start, so an upload that lands mid-turn
//! only affects the next turn.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::conversation_log::ConversationLog;
use super::errors::AgentError;
use super::query_parser;
use super::response_synthesizer::ResponseSynthesizer;
use super::tool_executor::ToolExecutor;
use super::tool_selector::{HistoryTurn, ToolSelector};
use super::types::{ConversationEntry, FileReference, SelectorOutcome, ToolOutcome, TurnPhase};

/// Upload extensions the session accepts.
pub const ACCEPTED_UPLOADS: &[&str] = &["png", "jpg", "jpeg", "mp3", "wav", "mp4", "pdf"];

/// Source of turn start times.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Session-level knobs.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Prior (query, answer) pairs handed to the selector.
    pub history_turns: usize,
    /// Where uploaded files are written.
    pub uploads_dir: PathBuf,
}

/// Cross-turn mutable state. Written only by upload, set-file and reset.
#[derive(Debug, Default)]
struct SessionState {
    file: Option<FileReference>,
    /// Set when `file` points at an upload this session wrote.
    owned_upload: Option<Arc<OwnedUpload>>,
    history: VecDeque<HistoryTurn>,
}

/// An upload written by the session. The file is removed once the session
/// and every turn that snapshotted it have let go.
#[derive(Debug)]
struct OwnedUpload {
    path: PathBuf,
}

impl Drop for OwnedUpload {
    fn drop(&mut self) {
        remove_upload(&self.path);
    }
}

/// Returns the session to `Idle` when a turn ends, including when the turn
/// future is dropped mid-flight.
struct IdleOnDrop<'a>(&'a AgentSession);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set_phase(TurnPhase::Idle);
    }
}

pub struct AgentSession {
    selector: ToolSelector,
    executor: ToolExecutor,
    synthesizer: ResponseSynthesizer,
    log: Arc<ConversationLog>,
    settings: SessionSettings,
    state: RwLock<SessionState>,
    phase: Mutex<TurnPhase>,
    turn_lock: tokio::sync::Mutex<()>,
    clock: Clock,
}

impl AgentSession {
    pub fn new(
        selector: ToolSelector,
        executor: ToolExecutor,
        synthesizer: ResponseSynthesizer,
        log: Arc<ConversationLog>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            selector,
            executor,
            synthesizer,
            log,
            settings,
            state: RwLock::new(SessionState::default()),
            phase: Mutex::new(TurnPhase::Idle),
            turn_lock: tokio::sync::Mutex::new(()),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used to stamp turns.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    // ─── Turns ──────────────────────────────────────────────────────────

    /// Process one raw input line and return the answer.
    ///
    /// Never fails: a turn that cannot select tools answers with
    /// `"Error processing query: <reason>"` and is not logged.
    pub async fn process_query(&self, raw_input: &str) -> String {
        let _turn = self.turn_lock.lock().await;
        let _idle = IdleOnDrop(self);
        let started_at = (self.clock)();

        let answer = match self.run_turn(raw_input, started_at).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                format!("Error processing query: {e}")
            }
        };

        answer
    }

    async fn run_turn(
        &self,
        raw_input: &str,
        started_at: DateTime<Utc>,
    ) -> Result<String, AgentError> {
        self.set_phase(TurnPhase::Parsing);
        let parsed = query_parser::parse(raw_input);

        // Holding the upload keeps it on disk until this turn is done, even
        // if a new upload or a reset replaces it meanwhile.
        let (session_file, _upload, history) = {
            let state = self.read_state();
            (
                state.file.as_ref().map(|f| f.path.clone()),
                state.owned_upload.clone(),
                state.history.iter().cloned().collect::<Vec<_>>(),
            )
        };
        // A file marker in the input applies to this turn only.
        let file_reference = parsed.file_reference.clone().or(session_file);

        self.set_phase(TurnPhase::Selecting);
        let selection = self
            .selector
            .select(
                &parsed.query,
                file_reference.as_deref(),
                self.executor.registry(),
                &history,
            )
            .await?;

        let (outcomes, answer) = match selection {
            SelectorOutcome::Direct { text } => (Vec::new(), text),
            SelectorOutcome::Invocations(invocations) => {
                self.set_phase(TurnPhase::Executing);
                let outcomes = self
                    .executor
                    .execute_all(invocations, file_reference.as_deref())
                    .await;

                self.set_phase(TurnPhase::Synthesizing);
                let answer = self.synthesizer.synthesize(&parsed.query, &outcomes).await;
                (outcomes, answer)
            }
        };

        self.set_phase(TurnPhase::Logging);
        self.record(started_at, &parsed.query, file_reference, outcomes, &answer);
        self.remember(parsed.query, answer.clone());

        Ok(answer)
    }

    /// Append the turn to the audit log. A failed write is reported on the
    /// diagnostic channel and never reaches the caller.
    fn record(
        &self,
        started_at: DateTime<Utc>,
        query: &str,
        file_path: Option<String>,
        tool_outcomes: Vec<ToolOutcome>,
        answer: &str,
    ) {
        let entry = ConversationEntry {
            timestamp: started_at,
            conversation_id: ConversationEntry::conversation_id_for(started_at),
            user_query: query.to_string(),
            file_path,
            tool_outcomes,
            final_response: answer.to_string(),
        };

        match self.log.append(&entry) {
            Ok(row_id) => tracing::info!(
                row_id,
                conversation_id = %entry.conversation_id,
                tools = %entry.tool_names(),
                "turn logged"
            ),
            Err(e) => tracing::error!(
                conversation_id = %entry.conversation_id,
                error = %e,
                "failed to write conversation log"
            ),
        }
    }

    fn remember(&self, query: String, answer: String) {
        let limit = self.settings.history_turns;
        let mut state = self.write_state();
        state.history.push_back(HistoryTurn { query, answer });
        while state.history.len() > limit {
            state.history.pop_front();
        }
    }

    // ─── File reference ─────────────────────────────────────────────────

    /// Point the session at an existing file. Returns `false` and leaves the
    /// session untouched if the path does not exist.
    pub fn set_file_path(&self, path: &str) -> bool {
        if path.trim().is_empty() || !Path::new(path).exists() {
            return false;
        }
        self.replace_file(FileReference::new(path), None);
        tracing::info!(path, "file path set");
        true
    }

    /// Store uploaded bytes and make them the session's file.
    ///
    /// The stored copy keeps the original extension and is owned by the
    /// session: it is deleted when replaced or on reset, once no running
    /// turn still uses it.
    pub async fn upload_file(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<FileReference, AgentError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|e| ACCEPTED_UPLOADS.contains(&e.as_str()))
            .ok_or_else(|| AgentError::UnsupportedUpload {
                file_name: file_name.to_string(),
                accepted: ACCEPTED_UPLOADS.join(", "),
            })?;

        tokio::fs::create_dir_all(&self.settings.uploads_dir).await?;
        let stored = self
            .settings
            .uploads_dir
            .join(format!("{}.{extension}", uuid::Uuid::new_v4()));
        tokio::fs::write(&stored, bytes).await?;

        let reference = FileReference::new(stored.to_string_lossy());
        self.replace_file(reference.clone(), Some(Arc::new(OwnedUpload { path: stored })));
        tracing::info!(
            file_name,
            path = %reference.path,
            size = bytes.len(),
            "upload stored"
        );
        Ok(reference)
    }

    fn replace_file(&self, file: FileReference, owned_upload: Option<Arc<OwnedUpload>>) {
        let previous = {
            let mut state = self.write_state();
            state.file = Some(file);
            std::mem::replace(&mut state.owned_upload, owned_upload)
        };
        // Released outside the lock; deletion waits for in-flight turns.
        drop(previous);
    }

    /// The session's current file, if any.
    pub fn current_file(&self) -> Option<FileReference> {
        self.read_state().file.clone()
    }

    /// Clear the file reference (deleting an owned upload) and the
    /// conversation context. The audit log is left alone.
    pub fn reset(&self) {
        let owned = {
            let mut state = self.write_state();
            state.file = None;
            state.history.clear();
            state.owned_upload.take()
        };
        drop(owned);
        tracing::info!("session reset");
    }

    // ─── Log access ─────────────────────────────────────────────────────

    /// Most recent `limit` turns, oldest first.
    pub fn recent_conversations(&self, limit: usize) -> Result<Vec<ConversationEntry>, AgentError> {
        self.log.recent(limit)
    }

    /// Delete every logged turn.
    pub fn clear_logs(&self) -> Result<usize, AgentError> {
        self.log.clear()
    }

    // ─── Phase ──────────────────────────────────────────────────────────

    pub fn phase(&self) -> TurnPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: TurnPhase) {
        let mut current = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != phase {
            tracing::debug!(from = current.as_str(), to = phase.as_str(), "turn phase");
            *current = phase;
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn remove_upload(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed previous upload"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove upload"),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
