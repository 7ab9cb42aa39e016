use std::time::Duration;

use async_trait::async_trait;
use chatbridge_types::ChatMessage;

/// Common surface the router drives, regardless of whether the agent runs
/// under a PTY or behind an HTTP API.
///
/// Methods that act on behalf of a chat user return human-readable status
/// strings rather than errors: whatever they say goes back to the chat
/// verbatim.
#[async_trait]
pub trait Agent: Send {
    /// Display name, used in status replies and transcripts.
    fn name(&self) -> &str;

    /// Bring the agent up. Returns false when it could not be started
    /// (the cause is logged).
    async fn start(&mut self) -> bool;

    /// Tear the agent down. Idempotent.
    async fn stop(&mut self);

    /// Forward a line of user text to the agent.
    async fn send_command(&mut self, command: &str) -> String;

    /// Pull the next batch of pending agent output, if any.
    async fn get_output(&mut self) -> Option<ChatMessage>;

    fn is_running(&self) -> bool;

    /// Whether the agent is blocked on an interactive prompt.
    fn is_waiting_for_input(&self) -> bool {
        false
    }

    /// The prompt text the agent is blocked on, empty when not waiting.
    fn input_prompt(&self) -> String {
        String::new()
    }

    /// Agent-specific slash commands as (name, description) pairs, in the
    /// order they should be listed in help output.
    fn custom_commands(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Extra help text appended to the built-in /help reply.
    fn custom_help(&self) -> String {
        String::new()
    }

    /// Run an agent-specific slash command. Returns None when the command
    /// is not recognized by this agent.
    async fn handle_custom_command(&mut self, command: &str) -> Option<String>;

    /// Interrupt whatever the agent is currently doing.
    async fn cancel(&mut self) -> String;

    /// Return the agent to a clean slate without changing whether it runs.
    async fn reset(&mut self) -> String;

    /// Whether a drained output message is UI noise that should not be
    /// relayed to the chat.
    fn should_filter_message(&self, _content: &str) -> bool {
        false
    }

    /// How long the router waits for a first reply before telling the user
    /// the response will arrive asynchronously.
    fn response_timeout(&self) -> Duration {
        Duration::from_secs(30)
    }
}
