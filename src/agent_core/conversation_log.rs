//! Append-only audit log of completed turns, stored in SQLite.
//!
//! One row per turn. The full ordered outcome list is stored as JSON, and
//! every invocation's arguments are kept, not only the last one.
//! WAL mode is enabled so readers do not block the writer.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::errors::AgentError;
use super::types::{ConversationEntry, ToolOutcome};

pub struct ConversationLog {
    conn: Mutex<Connection>,
}

impl ConversationLog {
    /// Open (or create) the log at the given path.
    ///
    /// Pass `":memory:"` for an in-memory database (tests).
    pub fn open(path: &str) -> Result<Self, AgentError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS conversation_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                user_query TEXT NOT NULL,
                file_path TEXT,
                file_type TEXT,
                tool_name TEXT NOT NULL DEFAULT '',
                tool_arguments TEXT NOT NULL DEFAULT '[]',
                tool_response TEXT NOT NULL DEFAULT '[]',
                final_response TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversation_log_conversation
                ON conversation_log(conversation_id);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, AgentError> {
        self.conn.lock().map_err(|e| AgentError::DatabaseError {
            reason: format!("log connection lock poisoned: {e}"),
        })
    }

    /// Append one entry. Returns the row id.
    pub fn append(&self, entry: &ConversationEntry) -> Result<i64, AgentError> {
        let tool_arguments = serde_json::to_string(&entry.tool_arguments())?;
        let tool_response = serde_json::to_string(&entry.tool_outcomes)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO conversation_log
                (timestamp, conversation_id, user_query, file_path, file_type,
                 tool_name, tool_arguments, tool_response, final_response)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.timestamp.to_rfc3339(),
                entry.conversation_id,
                entry.user_query,
                entry.file_path,
                entry.file_type(),
                entry.tool_names(),
                tool_arguments,
                tool_response,
                entry.final_response,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ConversationEntry>, AgentError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, conversation_id, user_query, file_path, tool_response,
                    final_response
             FROM (
                 SELECT * FROM conversation_log ORDER BY id DESC LIMIT ?1
             )
             ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (timestamp, conversation_id, user_query, file_path, tool_response, final_response) in rows
        {
            let tool_outcomes: Vec<ToolOutcome> = serde_json::from_str(&tool_response)?;
            entries.push(ConversationEntry {
                timestamp: parse_timestamp(&timestamp)?,
                conversation_id,
                user_query,
                file_path,
                tool_outcomes,
                final_response,
            });
        }
        Ok(entries)
    }

    /// Number of stored entries.
    pub fn count(&self) -> Result<usize, AgentError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM conversation_log", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Delete every entry. Explicit operator action only.
    pub fn clear(&self) -> Result<usize, AgentError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM conversation_log", [])?;
        tracing::info!(removed, "conversation log cleared");
        Ok(removed)
    }

    /// Run raw SQL against the log, for tests that need a broken sink.
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), AgentError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AgentError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AgentError::DatabaseError {
            reason: format!("bad timestamp '{raw}': {e}"),
        })
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(query: &str) -> ConversationEntry {
        ConversationEntry {
            timestamp: Utc::now(),
            conversation_id: "20240101_120000".into(),
            user_query: query.into(),
            file_path: Some("/tmp/x.png".into()),
            tool_outcomes: vec![
                ToolOutcome::Success {
                    tool_name: "analyze_sentiment".into(),
                    arguments: json!({"text": query}),
                    result: json!({"sentiment_score": 1, "sentiment_label": "Positive"}),
                },
                ToolOutcome::Failure {
                    tool_name: "analyze_multimodal_content".into(),
                    arguments: json!({"file_path": "/tmp/x.png"}),
                    error_message: "boom".into(),
                },
            ],
            final_response: format!("answer to {query}"),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let log = ConversationLog::open(":memory:").unwrap();
        let original = entry("first");
        log.append(&original).unwrap();

        let recent = log.recent(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].user_query, "first");
        assert_eq!(recent[0].tool_outcomes, original.tool_outcomes);
        assert_eq!(recent[0].timestamp, original.timestamp);
    }

    #[test]
    fn test_columns_hold_every_invocation() {
        let log = ConversationLog::open(":memory:").unwrap();
        log.append(&entry("q")).unwrap();

        let conn = log.lock().unwrap();
        let (tool_name, file_type, tool_arguments): (String, Option<String>, String) = conn
            .query_row(
                "SELECT tool_name, file_type, tool_arguments FROM conversation_log",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();

        assert_eq!(tool_name, "analyze_sentiment,analyze_multimodal_content");
        assert_eq!(file_type.as_deref(), Some(".png"));
        let args: serde_json::Value = serde_json::from_str(&tool_arguments).unwrap();
        assert_eq!(args.as_array().unwrap().len(), 2);
        assert_eq!(args[0]["arguments"]["text"], "q");
    }

    #[test]
    fn test_recent_returns_tail_oldest_first() {
        let log = ConversationLog::open(":memory:").unwrap();
        for i in 0..7 {
            log.append(&entry(&format!("q{i}"))).unwrap();
        }

        let recent = log.recent(3).unwrap();
        let queries: Vec<&str> = recent.iter().map(|e| e.user_query.as_str()).collect();
        assert_eq!(queries, vec!["q4", "q5", "q6"]);
        assert_eq!(log.recent(100).unwrap().len(), 7);
        assert!(log.recent(0).unwrap().is_empty());
    }

    #[test]
    fn test_direct_answer_entry_without_tools() {
        let log = ConversationLog::open(":memory:").unwrap();
        let mut direct = entry("hello");
        direct.tool_outcomes.clear();
        direct.file_path = None;
        log.append(&direct).unwrap();

        let back = log.recent(1).unwrap();
        assert!(back[0].tool_outcomes.is_empty());
        assert!(back[0].file_path.is_none());
    }

    #[test]
    fn test_clear() {
        let log = ConversationLog::open(":memory:").unwrap();
        log.append(&entry("a")).unwrap();
        log.append(&entry("b")).unwrap();
        assert_eq!(log.count().unwrap(), 2);
        assert_eq!(log.clear().unwrap(), 2);
        assert_eq!(log.count().unwrap(), 0);
    }

    #[test]
    fn test_file_backed_log_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.db");
        let path = path.to_str().unwrap();

        ConversationLog::open(path).unwrap().append(&entry("kept")).unwrap();
        let reopened = ConversationLog::open(path).unwrap();
        assert_eq!(reopened.recent(1).unwrap()[0].user_query, "kept");
    }
}
