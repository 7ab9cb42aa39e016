use std::path::PathBuf;

use clap::Parser;

/// CLI arguments for the agent-chat bridge
#[derive(Parser, Debug)]
#[command(name = "chatbridge")]
#[command(about = "Bridge a CLI coding agent (or chat-completion API) to a chat frontend")]
#[command(version)]
pub struct Cli {
    /// Agent to drive: cline, codex-cli, claude-api, openai-api, codex-api
    #[arg(long, env = "BRIDGE_AGENT", default_value = "cline")]
    pub agent: String,

    /// The single sender id allowed to interact with the bridge
    #[arg(long, env = "BRIDGE_USER_ID")]
    pub user_id: String,

    /// API key for API-backed agents
    #[arg(long, env = "BRIDGE_API_KEY")]
    pub api_key: Option<String>,

    /// Endpoint override for API-backed agents
    #[arg(long, env = "BRIDGE_API_URL")]
    pub api_url: Option<String>,

    /// Model override for API-backed agents
    #[arg(long, env = "BRIDGE_MODEL")]
    pub model: Option<String>,

    /// Launch command override for PTY agents, whitespace-separated
    /// (e.g. "/usr/local/bin/cline --non-interactive")
    #[arg(long, env = "BRIDGE_COMMAND")]
    pub command: Option<String>,

    /// Directory for session transcripts; omit to disable transcript logging
    #[arg(long, env = "BRIDGE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Depth of the duplicate-message suppression window
    #[arg(long, default_value_t = chatbridge_bridge::DEFAULT_DEDUP_DEPTH)]
    pub dedup_depth: usize,
}

impl Cli {
    pub fn command_argv(&self) -> Option<Vec<String>> {
        self.command.as_ref().map(|c| {
            c.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
    }
}
