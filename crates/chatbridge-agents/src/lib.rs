// Agent abstraction layer
//
// A single `Agent` trait fronts two very different execution models: CLI
// tools driven interactively under a pseudo-terminal, and remote
// chat-completion APIs. The router only ever sees the trait.

mod agent;
mod api;
mod profile;
mod pty;

pub use agent::Agent;
pub use api::{ApiAgent, ApiProvider};
pub use profile::{AgentProfile, CustomCommand};
pub use pty::PtyAgent;

use std::path::PathBuf;
use std::str::FromStr;

/// The agent flavors the factory knows how to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Cline,
    CodexCli,
    ClaudeApi,
    OpenAiApi,
    CodexApi,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Cline => "cline",
            AgentKind::CodexCli => "codex-cli",
            AgentKind::ClaudeApi => "claude-api",
            AgentKind::OpenAiApi => "openai-api",
            AgentKind::CodexApi => "codex-api",
        }
    }

    pub fn all() -> &'static [AgentKind] {
        &[
            AgentKind::Cline,
            AgentKind::CodexCli,
            AgentKind::ClaudeApi,
            AgentKind::OpenAiApi,
            AgentKind::CodexApi,
        ]
    }
}

impl FromStr for AgentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cline" => Ok(AgentKind::Cline),
            "codex-cli" | "codex_cli" => Ok(AgentKind::CodexCli),
            "claude-api" | "claude_api" | "claude" => Ok(AgentKind::ClaudeApi),
            "openai-api" | "openai_api" | "openai" => Ok(AgentKind::OpenAiApi),
            "codex-api" | "codex_api" => Ok(AgentKind::CodexApi),
            other => anyhow::bail!(
                "unknown agent type '{other}' (expected one of: {})",
                AgentKind::all()
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to construct an agent, regardless of kind. Fields
/// that do not apply to the chosen kind are ignored.
#[derive(Debug, Clone, Default)]
pub struct AgentSettings {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
    /// Overrides the profile's launch command for PTY agents.
    pub command: Option<Vec<String>>,
    /// Transcript directory for PTY agents; None disables transcripts.
    pub log_dir: Option<PathBuf>,
}

/// Build an agent of the requested kind behind the trait object the
/// router drives.
pub fn create_agent(kind: AgentKind, settings: AgentSettings) -> anyhow::Result<Box<dyn Agent>> {
    match kind {
        AgentKind::Cline | AgentKind::CodexCli => {
            let mut profile = match kind {
                AgentKind::Cline => AgentProfile::cline(),
                _ => AgentProfile::codex_cli(),
            };
            if let Some(command) = settings.command {
                profile.command = command;
            }
            Ok(Box::new(PtyAgent::new(profile, settings.log_dir)?))
        }
        AgentKind::ClaudeApi => {
            let key = settings
                .api_key
                .ok_or_else(|| anyhow::anyhow!("{kind} requires an API key"))?;
            Ok(Box::new(ApiAgent::anthropic(
                key,
                settings.api_url,
                settings.model,
            )))
        }
        AgentKind::OpenAiApi => {
            let key = settings
                .api_key
                .ok_or_else(|| anyhow::anyhow!("{kind} requires an API key"))?;
            Ok(Box::new(ApiAgent::openai(
                key,
                settings.api_url,
                settings.model,
            )))
        }
        AgentKind::CodexApi => Ok(Box::new(ApiAgent::local(
            settings.api_url,
            settings.model,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn agent_kind_round_trips_through_strings() {
        for kind in AgentKind::all() {
            assert_eq!(kind.as_str().parse::<AgentKind>().unwrap(), *kind);
        }
        assert!("telepathy".parse::<AgentKind>().is_err());
    }

    #[test]
    fn api_kinds_require_a_key() {
        let err = create_agent(AgentKind::ClaudeApi, AgentSettings::default())
            .err()
            .expect("key should be required");
        assert!(err.to_string().contains("API key"));

        // The local endpoint is unauthenticated
        assert!(create_agent(AgentKind::CodexApi, AgentSettings::default()).is_ok());
    }

    #[test]
    fn command_override_replaces_profile_launch_command() {
        let settings = AgentSettings {
            command: Some(vec!["/usr/local/bin/cline".to_string(), "--ci".to_string()]),
            ..Default::default()
        };
        let agent = create_agent(AgentKind::Cline, settings).unwrap();
        assert_eq!(agent.name(), "Cline");
        assert!(!agent.is_running());
    }

    #[test]
    fn cline_exposes_mode_switch_commands() {
        let agent = create_agent(AgentKind::Cline, AgentSettings::default()).unwrap();
        let commands = agent.custom_commands();
        let names: Vec<&str> = commands.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["/plan", "/act"]);
        assert!(agent.custom_help().contains("/plan"));
    }
}
