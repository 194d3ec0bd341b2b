pub mod agent_core;
pub mod config;
pub mod inference;
pub mod tools;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use agent_core::{
    AgentError, AgentSession, ConversationLog, ResponseSynthesizer, SessionSettings,
    ToolExecutor, ToolSelector,
};
use config::AppConfig;
use inference::{resolve_active_model, InferenceClient};

/// Return the platform-standard data directory for the agent.
///
/// - macOS: `~/Library/Application Support/com.multitool-agent/`
/// - Windows: `{FOLDERID_RoamingAppData}\com.multitool-agent\`
/// - Linux: `$XDG_DATA_HOME/com.multitool-agent/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.multitool-agent/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("com.multitool-agent");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".multitool-agent")
}

/// Output format for the diagnostic log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Rotated logs kept next to `agent.log` unless configured otherwise.
pub const DEFAULT_KEPT_LOGS: u32 = 3;

/// Diagnostic log settings for [`init_tracing`].
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub dir: PathBuf,
    /// Used when `RUST_LOG` is unset.
    pub default_filter: String,
    pub format: LogFormat,
    /// Previous runs' logs kept as `agent.log.1 ..= agent.log.N`.
    pub keep: u32,
}

/// Initialize the tracing subscriber, writing to `<dir>/agent.log`.
///
/// Existing logs are rotated first. Returns the log file path.
pub fn init_tracing(settings: &LogSettings) -> io::Result<PathBuf> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all(&settings.dir)?;
    let log_path = settings.dir.join("agent.log");
    rotate_log_file(&log_path, settings.keep);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let writer = FlushingWriter::new(log_file);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.default_filter));

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);
    match settings.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path.display(),
        kept_logs = settings.keep,
        pid = std::process::id(),
        "=== multitool-agent starting ==="
    );
    Ok(log_path)
}

/// Shift `agent.log` to `agent.log.1`, `.1` to `.2` and so on, dropping
/// whatever would land beyond `.{keep}`. With `keep == 0` the current log is
/// simply removed. Gaps in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let numbered = |n: u32| -> PathBuf {
        let mut name = base_path.as_os_str().to_owned();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    };

    if keep == 0 {
        let _ = std::fs::remove_file(base_path);
        return;
    }

    let _ = std::fs::remove_file(numbered(keep));
    for n in (1..keep).rev() {
        let _ = std::fs::rename(numbered(n), numbered(n + 1));
    }
    if base_path.exists() {
        let _ = std::fs::rename(base_path, numbered(1));
    }
}

/// A writer that flushes the log file after every write, so a line is on
/// disk before the next turn starts. Clones share one file handle.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<Mutex<File>>,
}

impl FlushingWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }

    fn locked(&self) -> io::Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|e| io::Error::other(format!("log file lock poisoned: {e}")))
    }
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.locked()?;
        let written = file.write(buf)?;
        file.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.locked()?.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Wire a session from configuration: one inference client per role, the
/// tool registry, the conversation log and the uploads directory.
pub fn build_session(config: &AppConfig) -> Result<AgentSession, AgentError> {
    let (active_key, _) = resolve_active_model(&config.models)?;
    let settings = &config.agent;

    let selector_key = settings.selector_model.as_deref().unwrap_or(&active_key);
    let synthesizer_key = settings.synthesizer_model.as_deref().unwrap_or(&active_key);
    let selector_client =
        InferenceClient::from_config_with_model(config.models.clone(), selector_key)?;
    let synthesizer_client =
        InferenceClient::from_config_with_model(config.models.clone(), synthesizer_key)?;

    let registry = Arc::new(tools::build_registry(&config.tools)?);

    let log_path = settings
        .log_path
        .clone()
        .unwrap_or_else(|| data_dir().join("conversations.db"));
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log = Arc::new(ConversationLog::open(&log_path.to_string_lossy())?);

    let uploads_dir = settings
        .uploads_dir
        .clone()
        .unwrap_or_else(|| data_dir().join("uploads"));

    tracing::info!(
        selector_model = selector_key,
        selector_url = selector_client.current_base_url(),
        synthesizer_model = synthesizer_key,
        log_path = %log_path.display(),
        uploads_dir = %uploads_dir.display(),
        "session configured"
    );

    Ok(AgentSession::new(
        ToolSelector::new(Arc::new(selector_client)),
        ToolExecutor::new(registry, Duration::from_secs(settings.tool_timeout_secs)),
        ResponseSynthesizer::new(Arc::new(synthesizer_client)),
        log,
        SessionSettings {
            history_turns: settings.history_turns,
            uploads_dir,
        },
    ))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
