use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chatbridge_agents::{create_agent, AgentKind, AgentSettings};
use chatbridge_bridge::{ChatSink, Router, RouterSettings};

mod cli;
mod console;

use cli::Cli;
use console::ConsoleSink;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let kind: AgentKind = cli.agent.parse()?;
    let agent = create_agent(
        kind,
        AgentSettings {
            api_key: cli.api_key.clone(),
            api_url: cli.api_url.clone(),
            model: cli.model.clone(),
            command: cli.command_argv(),
            log_dir: cli.log_dir.clone(),
        },
    )?;
    info!(agent = %kind, user_id = %cli.user_id, "bridge configured");

    let mut settings = RouterSettings::new(&cli.user_id);
    settings.dedup_depth = cli.dedup_depth;

    let sink: Arc<dyn ChatSink> = Arc::new(ConsoleSink);
    let mut router = Router::new(settings, agent, sink);
    router.initialize().await;

    println!("chatbridge ready - /start to launch the agent, /help for commands, /quit to exit");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }
        router.dispatch(line, &cli.user_id).await;
    }

    router.shutdown().await;
    info!("bridge stopped");
    Ok(())
}
