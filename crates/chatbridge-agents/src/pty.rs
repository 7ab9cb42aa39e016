use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chatbridge_terminal::{ChunkFilter, PromptDetector, SessionConfig, SessionManager};
use chatbridge_types::{ChatMessage, TRANSPORT_CHUNK_LIMIT};
use tracing::error;

use crate::agent::Agent;
use crate::profile::AgentProfile;

/// Delay between forwarding a mode-switch command and collecting the
/// session's acknowledgement.
const CUSTOM_COMMAND_SETTLE_MS: u64 = 500;
/// Pause between stop and restart during /reset so the old process tree
/// finishes dying.
const RESET_SETTLE_MS: u64 = 500;

/// An agent that runs as a local subprocess under a pseudo-terminal.
pub struct PtyAgent {
    profile: AgentProfile,
    manager: SessionManager,
}

impl PtyAgent {
    pub fn new(profile: AgentProfile, log_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let detector = match &profile.prompt_patterns {
            Some(patterns) => {
                let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
                PromptDetector::with_patterns(&refs)?
            }
            None => PromptDetector::new(),
        };

        let mut config = SessionConfig::new(profile.command.clone(), profile.name.clone());
        config.filter = ChunkFilter::new(
            profile.welcome_keywords.clone(),
            profile.mode_keywords.clone(),
        );
        config.detector = detector;
        config.log_dir = log_dir;

        Ok(Self {
            profile,
            manager: SessionManager::new(config),
        })
    }
}

#[async_trait]
impl Agent for PtyAgent {
    fn name(&self) -> &str {
        &self.profile.name
    }

    async fn start(&mut self) -> bool {
        match self.manager.start().await {
            Ok(_) => true,
            Err(e) => {
                error!(agent = %self.profile.name, error = %e, "failed to start agent");
                false
            }
        }
    }

    async fn stop(&mut self) {
        self.manager.stop().await;
    }

    async fn send_command(&mut self, command: &str) -> String {
        match self.manager.send(command).await {
            Ok(()) => "Command sent".to_string(),
            Err(e) => format!("Error: {e}"),
        }
    }

    async fn get_output(&mut self) -> Option<ChatMessage> {
        self.manager
            .drain_output(TRANSPORT_CHUNK_LIMIT)
            .map(|content| ChatMessage::agent_output(content, &self.profile.name))
    }

    fn is_running(&self) -> bool {
        self.manager.is_running()
    }

    fn is_waiting_for_input(&self) -> bool {
        self.manager.is_waiting_for_input()
    }

    fn input_prompt(&self) -> String {
        self.manager.input_prompt()
    }

    fn custom_commands(&self) -> Vec<(String, String)> {
        self.profile
            .custom_commands
            .iter()
            .map(|c| (c.name.clone(), c.description.clone()))
            .collect()
    }

    fn custom_help(&self) -> String {
        self.profile.custom_help.clone()
    }

    async fn handle_custom_command(&mut self, command: &str) -> Option<String> {
        let confirmation = self
            .profile
            .custom_commands
            .iter()
            .find(|c| c.name == command)
            .map(|c| c.confirmation.clone())?;

        let result = self.send_command(command).await;
        tokio::time::sleep(Duration::from_millis(CUSTOM_COMMAND_SETTLE_MS)).await;

        let mut response = format!("{confirmation}\n{result}");
        if let Some(output) = self.get_output().await {
            response.push('\n');
            response.push_str(&output.content);
        }
        Some(response)
    }

    async fn cancel(&mut self) -> String {
        match self.manager.interrupt() {
            Ok(()) => "\u{1F6D1} Sent cancel signal (Ctrl+C) to agent".to_string(),
            Err(e) => format!("\u{274C} Failed to send cancel signal: {e}"),
        }
    }

    async fn reset(&mut self) -> String {
        if self.manager.is_running() {
            self.manager.stop().await;
            tokio::time::sleep(Duration::from_millis(RESET_SETTLE_MS)).await;
        }

        match self.manager.start().await {
            Ok(_) => "\u{1F504} **Agent Reset Complete**\n\n\
                      \u{2705} Fresh session started\n\
                      \u{2705} All state cleared\n\
                      \u{2705} Ready for new commands"
                .to_string(),
            Err(e) => format!("\u{274C} Reset failed - could not start new session: {e}"),
        }
    }

    fn should_filter_message(&self, content: &str) -> bool {
        self.profile.should_filter_message(content)
    }

    fn response_timeout(&self) -> Duration {
        self.profile.response_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_profile() -> AgentProfile {
        AgentProfile::plain("Shell", vec!["/bin/sh".to_string()])
    }

    #[tokio::test]
    async fn send_before_start_reports_not_running() {
        let mut agent = PtyAgent::new(shell_profile(), None).unwrap();
        let status = agent.send_command("echo hi").await;
        assert!(status.starts_with("Error:"), "got: {status}");
        assert!(!agent.is_running());
    }

    #[tokio::test]
    async fn shell_output_round_trips_through_agent() {
        let mut agent = PtyAgent::new(shell_profile(), None).unwrap();
        assert!(agent.start().await);
        assert_eq!(agent.send_command("echo agent-check").await, "Command sent");

        let mut seen = String::new();
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Some(msg) = agent.get_output().await {
                seen.push_str(&msg.content);
                if seen.contains("agent-check") {
                    break;
                }
            }
        }
        assert!(seen.contains("agent-check"), "got: {seen:?}");
        agent.stop().await;
    }

    #[tokio::test]
    async fn reset_restarts_a_stopped_agent() {
        let mut agent = PtyAgent::new(shell_profile(), None).unwrap();
        assert!(agent.start().await);
        agent.stop().await;
        assert!(!agent.is_running());

        let reply = agent.reset().await;
        assert!(reply.contains("Reset Complete"), "got: {reply}");
        assert!(agent.is_running());
        agent.stop().await;
    }

    #[tokio::test]
    async fn unknown_custom_command_defers_to_default_handling() {
        let mut agent = PtyAgent::new(shell_profile(), None).unwrap();
        assert!(agent.handle_custom_command("/plan").await.is_none());
    }

    #[tokio::test]
    async fn cancel_without_session_reports_failure() {
        let mut agent = PtyAgent::new(shell_profile(), None).unwrap();
        let reply = agent.cancel().await;
        assert!(reply.contains("Failed to send cancel signal"), "got: {reply}");
    }
}
