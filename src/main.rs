use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use multitool_agent::agent_core::AgentSession;
use multitool_agent::{
    build_session, config, data_dir, init_tracing, LogFormat, LogSettings, DEFAULT_KEPT_LOGS,
};

const BANNER: &str = "Multitool agent ready. Type 'exit' to quit, ':help' for commands.\n\
For file processing, use format: 'file: path_to_file | query: your_query'";

const HELP: &str = "\
:upload <path>    store a copy of a file and use it for following turns
:file <path>      use an existing file for following turns
:history [n]      show the last n logged turns (default 5)
:reset            forget the current file and conversation context
:clear-logs       delete every logged turn
exit | quit       leave";

#[derive(Debug, Parser)]
#[command(name = "multitool-agent", version, about)]
struct Args {
    /// Config file. Defaults to $MULTITOOL_AGENT_CONFIG, then config/agent.yaml
    /// searched upward from the working directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "multitool_agent=info,warn")]
    log_level: String,

    /// Write diagnostic logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Directory for agent.log. Defaults to the platform data directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Previous runs' logs to keep (agent.log.1 ..= agent.log.N).
    #[arg(long, default_value_t = DEFAULT_KEPT_LOGS)]
    keep_logs: u32,

    /// Answer a single query and exit.
    #[arg(long, short)]
    query: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_settings = LogSettings {
        dir: args.log_dir.clone().unwrap_or_else(data_dir),
        default_filter: args.log_level.clone(),
        format: if args.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
        keep: args.keep_logs,
    };
    let log_file = init_tracing(&log_settings)
        .with_context(|| format!("failed to open log in {}", log_settings.dir.display()))?;

    let cwd = std::env::current_dir().context("no working directory")?;
    let config_path = config::find_config_path(args.config.as_deref(), &cwd)?;
    let app_config = config::load_config(&config_path)?;
    tracing::info!(config = %config_path.display(), "config loaded");

    let session = build_session(&app_config)?;

    if let Some(query) = args.query {
        println!("{}", session.process_query(&query).await);
        return Ok(());
    }

    println!("{BANNER}");
    println!("(logs: {})", log_file.display());
    repl(&session).await
}

async fn repl(session: &AgentSession) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let output = match input.strip_prefix(':') {
            Some(command) => run_command(session, command).await,
            None => session.process_query(input).await,
        };
        println!("{output}");
    }

    tracing::info!("session ended");
    Ok(())
}

async fn run_command(session: &AgentSession, command: &str) -> String {
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));

    match name {
        "help" => HELP.to_string(),
        "upload" => match upload(session, rest).await {
            Ok(path) => format!("Uploaded. Current file: {path}"),
            Err(e) => format!("Upload failed: {e:#}"),
        },
        "file" => {
            if session.set_file_path(rest) {
                format!("Current file: {rest}")
            } else {
                format!("No such file: {rest}")
            }
        }
        "history" => {
            let limit = rest.parse().unwrap_or(5);
            match session.recent_conversations(limit) {
                Ok(entries) if entries.is_empty() => "No logged turns.".to_string(),
                Ok(entries) => entries
                    .iter()
                    .map(|e| {
                        let tools = e.tool_names();
                        format!(
                            "[{}] {}\n  tools: {}\n  answer: {}",
                            e.conversation_id,
                            e.user_query,
                            if tools.is_empty() { "-" } else { tools.as_str() },
                            e.final_response
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
                Err(e) => format!("Failed to read log: {e}"),
            }
        }
        "reset" => {
            session.reset();
            "Session reset.".to_string()
        }
        "clear-logs" => match session.clear_logs() {
            Ok(n) => format!("Deleted {n} logged turns."),
            Err(e) => format!("Failed to clear log: {e}"),
        },
        other => format!("Unknown command ':{other}'. Try ':help'."),
    }
}

async fn upload(session: &AgentSession, path: &str) -> Result<String> {
    let path = Path::new(path);
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let reference = session.upload_file(&file_name, &bytes).await?;
    Ok(reference.path)
}
