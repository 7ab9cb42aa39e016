use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chatbridge_agents::Agent;
use chatbridge_terminal::strip_control_sequences;
use chatbridge_types::{MAX_MESSAGE_LENGTH, RATE_LIMIT_MS, TRANSPORT_CHUNK_LIMIT};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dedup::{dedup_lines, RecentHashes, DEFAULT_DEDUP_DEPTH};
use crate::limiter::RateLimiter;
use crate::sink::{chunk_text, ChatSink};

/// How often the output monitor polls a running agent.
pub const MONITOR_POLL_SECS: u64 = 2;
/// Poll interval while the dispatcher waits for a first reply.
const FIRST_OUTPUT_POLL_MS: u64 = 250;

/// Single-tenant routing context, constructed once at startup.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// The only sender id allowed to interact with the bridge.
    pub authorized_sender: String,
    pub rate_limit: Duration,
    pub max_message_length: usize,
    pub dedup_depth: usize,
    pub monitor_poll: Duration,
}

impl RouterSettings {
    pub fn new(authorized_sender: impl Into<String>) -> Self {
        Self {
            authorized_sender: authorized_sender.into(),
            rate_limit: Duration::from_millis(RATE_LIMIT_MS),
            max_message_length: MAX_MESSAGE_LENGTH,
            dedup_depth: DEFAULT_DEDUP_DEPTH,
            monitor_poll: Duration::from_secs(MONITOR_POLL_SECS),
        }
    }
}

/// Bridges one agent to one chat sink: routes inbound text to the agent
/// and relays filtered agent output back out.
pub struct Router {
    settings: RouterSettings,
    agent: Arc<Mutex<Box<dyn Agent>>>,
    sink: Arc<dyn ChatSink>,
    custom_commands: Vec<(String, String)>,
    recent: Arc<StdMutex<RecentHashes>>,
    limiter: RateLimiter,
    monitor: Option<JoinHandle<()>>,
}

impl Router {
    pub fn new(settings: RouterSettings, agent: Box<dyn Agent>, sink: Arc<dyn ChatSink>) -> Self {
        let recent = Arc::new(StdMutex::new(RecentHashes::new(settings.dedup_depth)));
        let limiter = RateLimiter::new(settings.rate_limit);
        Self {
            settings,
            agent: Arc::new(Mutex::new(agent)),
            sink,
            custom_commands: Vec::new(),
            recent,
            limiter,
            monitor: None,
        }
    }

    /// Fetch the agent's custom command table. Call once before the first
    /// dispatch.
    pub async fn initialize(&mut self) {
        let agent = self.agent.lock().await;
        self.custom_commands = agent.custom_commands();
        info!(
            agent = agent.name(),
            count = self.custom_commands.len(),
            "loaded custom commands"
        );
    }

    /// Route one inbound message.
    pub async fn dispatch(&mut self, text: &str, sender: &str) {
        if sender != self.settings.authorized_sender {
            warn!(sender, "rejected message from unauthorized sender");
            self.reply(sender, "\u{274C} Unauthorized").await;
            return;
        }

        let text = text.trim();
        if text.is_empty() {
            return;
        }

        if text.starts_with('/') {
            let cmd = text.split_whitespace().next().unwrap_or(text).to_string();
            self.handle_command(&cmd, text, sender).await;
        } else {
            self.handle_free_text(text, sender).await;
        }
    }

    /// Stop the agent and cancel the output monitor.
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.monitor.take() {
            task.abort();
        }
        self.agent.lock().await.stop().await;
    }

    async fn handle_command(&mut self, cmd: &str, full_text: &str, sender: &str) {
        match cmd {
            "/start" => self.handle_start(sender).await,
            "/stop" => {
                self.agent.lock().await.stop().await;
                self.reply(sender, "\u{1F6D1} Agent stopped").await;
            }
            "/status" => {
                let status = {
                    let agent = self.agent.lock().await;
                    let state = if agent.is_running() {
                        "\u{1F7E2} Running"
                    } else {
                        "\u{1F534} Stopped"
                    };
                    let waiting = if agent.is_waiting_for_input() {
                        let prompt = agent.input_prompt();
                        if prompt.is_empty() {
                            "\n\u{23F8} Waiting for input".to_string()
                        } else {
                            format!("\n\u{23F8} Waiting for input: {prompt}")
                        }
                    } else {
                        String::new()
                    };
                    format!("Status: {state}{waiting}\nAgent: {}", agent.name())
                };
                self.reply(sender, &status).await;
            }
            "/cancel" => {
                let reply = {
                    let mut agent = self.agent.lock().await;
                    if !agent.is_running() {
                        format!("\u{274C} {} not running. Use /start", agent.name())
                    } else {
                        agent.cancel().await
                    }
                };
                self.reply(sender, &reply).await;
            }
            "/reset" => self.handle_reset(sender).await,
            "/help" => {
                let help = self.build_help().await;
                self.reply(sender, &help).await;
            }
            _ if self.custom_commands.iter().any(|(name, _)| name == cmd) => {
                self.handle_custom(cmd, full_text, sender).await;
            }
            _ => {
                let listing = self.format_commands();
                self.reply(
                    sender,
                    &format!("\u{274C} Unknown command: {cmd}\n\nAvailable commands:\n{listing}"),
                )
                .await;
            }
        }
    }

    async fn handle_start(&mut self, sender: &str) {
        let reply = {
            let mut agent = self.agent.lock().await;
            if agent.is_running() {
                self.reply(sender, "\u{2139} Agent already running").await;
                return;
            }
            if agent.start().await {
                format!(
                    "\u{2705} {} session started\n\n\
                     Send messages to interact with the agent\n\
                     \u{2022} `/help` - Show all available commands\n\
                     \u{2022} `/status` - Check current status",
                    agent.name()
                )
            } else {
                let failed = format!("\u{274C} Failed to start {}", agent.name());
                self.reply(sender, &failed).await;
                return;
            }
        };
        self.ensure_monitor();
        self.reply(sender, &reply).await;
    }

    async fn handle_reset(&mut self, sender: &str) {
        if let Some(task) = self.monitor.take() {
            task.abort();
        }
        self.recent.lock().unwrap().clear();

        let (reply, running) = {
            let mut agent = self.agent.lock().await;
            let reply = agent.reset().await;
            (reply, agent.is_running())
        };
        if running {
            self.ensure_monitor();
        }
        self.reply(sender, &reply).await;
    }

    async fn handle_custom(&mut self, cmd: &str, full_text: &str, sender: &str) {
        let reply = {
            let mut agent = self.agent.lock().await;
            if !agent.is_running() {
                format!("\u{274C} {} not running. Use /start", agent.name())
            } else if let Some(response) = agent.handle_custom_command(cmd).await {
                response
            } else {
                // No agent-owned handling: forward like regular text
                agent.send_command(full_text).await;
                tokio::time::sleep(Duration::from_secs(1)).await;
                match agent.get_output().await {
                    Some(msg) => msg.content,
                    None => return,
                }
            }
        };
        self.reply(sender, &reply).await;
    }

    async fn handle_free_text(&mut self, text: &str, sender: &str) {
        {
            let agent = self.agent.lock().await;
            if !agent.is_running() {
                let reply = format!("\u{274C} {} not running. Use /start", agent.name());
                drop(agent);
                self.reply(sender, &reply).await;
                return;
            }
        }

        if text.chars().count() > self.settings.max_message_length {
            self.reply(
                sender,
                &format!(
                    "\u{274C} Message too long (max {} characters)",
                    self.settings.max_message_length
                ),
            )
            .await;
            return;
        }

        if !self.limiter.check(sender) {
            self.reply(sender, "\u{23F1} Please wait before sending another message")
                .await;
            return;
        }

        self.reply(sender, "\u{1F4E4} Message sent...").await;

        let reply = {
            let mut agent = self.agent.lock().await;
            let status = agent.send_command(text).await;
            if status.starts_with("Error") {
                status
            } else {
                match Self::wait_for_first_output(&mut **agent).await {
                    Some(content) => content,
                    None => format!(
                        "\u{23F3} {} is still working; output will arrive asynchronously",
                        agent.name()
                    ),
                }
            }
        };
        self.reply(sender, &reply).await;
    }

    /// Poll for the agent's first reply, bounded by the agent's own
    /// response timeout.
    async fn wait_for_first_output(agent: &mut dyn Agent) -> Option<String> {
        let deadline = Instant::now() + agent.response_timeout();
        loop {
            if let Some(msg) = agent.get_output().await {
                return Some(msg.content);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(FIRST_OUTPUT_POLL_MS)).await;
        }
    }

    async fn build_help(&self) -> String {
        let (name, custom_help) = {
            let agent = self.agent.lock().await;
            (agent.name().to_string(), agent.custom_help())
        };
        format!(
            "\u{1F916} **Agent-Chat Bridge Help**\n\n\
             **Getting Started:**\n\
             \u{2022} `/stop` - Stop the current session\n\
             \u{2022} `/start` - Start a new {name} session\n\
             \u{2022} `/reset` - Reset agent state and start fresh\n\n\
             **Commands:**\n\
             \u{2022} `/status` - Check bot and session status\n\
             \u{2022} `/cancel` - Cancel current operation\n\n\
             **Available Commands:**\n{}{custom_help}",
            self.format_commands()
        )
    }

    fn format_commands(&self) -> String {
        let mut listing = String::new();
        for (name, description) in &self.custom_commands {
            let short = description.split(" - ").next().unwrap_or(description);
            listing.push_str(&format!("\u{2022} `{name}` - {short}\n"));
        }
        listing
    }

    fn ensure_monitor(&mut self) {
        let stale = self.monitor.as_ref().map_or(true, |task| task.is_finished());
        if !stale {
            return;
        }
        let agent = Arc::clone(&self.agent);
        let sink = Arc::clone(&self.sink);
        let recent = Arc::clone(&self.recent);
        let recipient = self.settings.authorized_sender.clone();
        let poll = self.settings.monitor_poll;
        self.monitor = Some(tokio::spawn(monitor_loop(
            agent, sink, recent, recipient, poll,
        )));
    }

    async fn reply(&self, recipient: &str, text: &str) {
        deliver(self.sink.as_ref(), recipient, text).await;
    }
}

/// Background loop relaying agent output while the agent runs.
async fn monitor_loop(
    agent: Arc<Mutex<Box<dyn Agent>>>,
    sink: Arc<dyn ChatSink>,
    recent: Arc<StdMutex<RecentHashes>>,
    recipient: String,
    poll: Duration,
) {
    info!("output monitor started");
    loop {
        let outbound = {
            let mut agent = agent.lock().await;
            if !agent.is_running() {
                break;
            }
            match agent.get_output().await {
                Some(msg) => prepare_outbound(&msg.content, &**agent, &recent),
                None => None,
            }
        };
        if let Some(text) = outbound {
            deliver(sink.as_ref(), &recipient, &text).await;
        }
        tokio::time::sleep(poll).await;
    }
    info!("output monitor stopped");
}

/// Clean one drained message for relay: strip control sequences, collapse
/// repeated lines, drop agent-classified UI spam and exact repeats.
fn prepare_outbound(
    content: &str,
    agent: &dyn Agent,
    recent: &StdMutex<RecentHashes>,
) -> Option<String> {
    let clean = dedup_lines(&strip_control_sequences(content));
    if clean.trim().is_empty() {
        return None;
    }
    if agent.should_filter_message(&clean) {
        debug!("filtered agent UI spam");
        return None;
    }
    if recent.lock().unwrap().seen(&clean) {
        debug!("filtered duplicate message");
        return None;
    }
    Some(clean)
}

async fn deliver(sink: &dyn ChatSink, recipient: &str, text: &str) {
    for chunk in chunk_text(text, TRANSPORT_CHUNK_LIMIT) {
        if let Err(e) = sink.send_message(recipient, &chunk).await {
            error!(error = %e, "failed to deliver message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatbridge_types::ChatMessage;
    use std::collections::VecDeque;

    struct RecordingSink {
        messages: StdMutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: StdMutex::new(Vec::new()),
            })
        }

        fn texts(&self) -> Vec<String> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ChatSink for RecordingSink {
        async fn send_message(&self, recipient: &str, text: &str) -> anyhow::Result<()> {
            self.messages
                .lock()
                .unwrap()
                .push((recipient.to_string(), text.to_string()));
            Ok(())
        }
    }

    /// Fake agent that echoes each forwarded command back as output.
    struct ScriptedAgent {
        running: bool,
        echo: bool,
        outputs: VecDeque<String>,
    }

    impl ScriptedAgent {
        fn new() -> Self {
            Self {
                running: false,
                echo: true,
                outputs: VecDeque::new(),
            }
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn name(&self) -> &str {
            "Scripted"
        }

        async fn start(&mut self) -> bool {
            self.running = true;
            true
        }

        async fn stop(&mut self) {
            self.running = false;
        }

        async fn send_command(&mut self, command: &str) -> String {
            if !self.running {
                return "Error: Scripted not running".to_string();
            }
            if self.echo {
                self.outputs.push_back(format!("echo: {command}"));
            }
            "Command sent".to_string()
        }

        async fn get_output(&mut self) -> Option<ChatMessage> {
            self.outputs
                .pop_front()
                .map(|content| ChatMessage::agent_output(content, "Scripted"))
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn custom_commands(&self) -> Vec<(String, String)> {
            vec![("/mode".to_string(), "Switch modes - test only".to_string())]
        }

        async fn handle_custom_command(&mut self, command: &str) -> Option<String> {
            (command == "/mode").then(|| "mode switched".to_string())
        }

        async fn cancel(&mut self) -> String {
            "cancelled".to_string()
        }

        async fn reset(&mut self) -> String {
            self.running = true;
            "reset done".to_string()
        }

        fn should_filter_message(&self, content: &str) -> bool {
            content.contains("SPAM")
        }

        fn response_timeout(&self) -> Duration {
            Duration::from_millis(300)
        }
    }

    fn test_router(sink: Arc<RecordingSink>) -> Router {
        let mut settings = RouterSettings::new("42");
        // Long poll so the monitor cannot race the dispatcher in tests
        settings.monitor_poll = Duration::from_secs(30);
        Router::new(settings, Box::new(ScriptedAgent::new()), sink)
    }

    #[tokio::test]
    async fn unauthorized_sender_is_rejected() {
        let sink = RecordingSink::new();
        let mut router = test_router(Arc::clone(&sink));
        router.dispatch("hello", "999").await;
        assert_eq!(sink.texts(), vec!["\u{274C} Unauthorized".to_string()]);
    }

    #[tokio::test]
    async fn free_text_before_start_is_refused() {
        let sink = RecordingSink::new();
        let mut router = test_router(Arc::clone(&sink));
        router.dispatch("hello", "42").await;
        let texts = sink.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("not running"), "got: {texts:?}");
        assert!(texts[0].contains("/start"));
    }

    #[tokio::test]
    async fn free_text_round_trips_through_the_agent() {
        let sink = RecordingSink::new();
        let mut router = test_router(Arc::clone(&sink));
        router.dispatch("/start", "42").await;
        router.dispatch("hello agent", "42").await;

        let texts = sink.texts();
        assert!(texts.iter().any(|t| t.contains("session started")));
        assert!(texts.iter().any(|t| t == "echo: hello agent"), "got: {texts:?}");
        router.shutdown().await;
    }

    #[tokio::test]
    async fn second_message_inside_rate_window_is_rejected() {
        let sink = RecordingSink::new();
        let mut router = test_router(Arc::clone(&sink));
        router.dispatch("/start", "42").await;
        router.dispatch("one", "42").await;
        router.dispatch("two", "42").await;

        let texts = sink.texts();
        assert!(texts.iter().any(|t| t.contains("Please wait")), "got: {texts:?}");
        assert!(!texts.iter().any(|t| t == "echo: two"));
        router.shutdown().await;
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let sink = RecordingSink::new();
        let mut settings = RouterSettings::new("42");
        settings.max_message_length = 8;
        settings.monitor_poll = Duration::from_secs(30);
        let mut router = Router::new(settings, Box::new(ScriptedAgent::new()), Arc::clone(&sink) as Arc<dyn ChatSink>);
        router.dispatch("/start", "42").await;
        router.dispatch("nine char", "42").await;

        let texts = sink.texts();
        assert!(texts.iter().any(|t| t.contains("Message too long")), "got: {texts:?}");
        router.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_slash_command_returns_a_listing() {
        let sink = RecordingSink::new();
        let mut router = test_router(Arc::clone(&sink));
        router.initialize().await;
        router.dispatch("/bogus", "42").await;

        let texts = sink.texts();
        assert!(texts[0].contains("Unknown command: /bogus"));
        assert!(texts[0].contains("/mode"));
    }

    #[tokio::test]
    async fn custom_command_uses_agent_handler() {
        let sink = RecordingSink::new();
        let mut router = test_router(Arc::clone(&sink));
        router.initialize().await;
        router.dispatch("/start", "42").await;
        router.dispatch("/mode", "42").await;

        let texts = sink.texts();
        assert!(texts.iter().any(|t| t == "mode switched"), "got: {texts:?}");
        router.shutdown().await;
    }

    #[tokio::test]
    async fn silent_agent_gets_async_arrival_notice() {
        let sink = RecordingSink::new();
        let settings = {
            let mut s = RouterSettings::new("42");
            s.monitor_poll = Duration::from_secs(30);
            s
        };
        let mut agent = ScriptedAgent::new();
        agent.echo = false;
        let mut router = Router::new(settings, Box::new(agent), Arc::clone(&sink) as Arc<dyn ChatSink>);
        router.dispatch("/start", "42").await;
        router.dispatch("slow question", "42").await;

        let texts = sink.texts();
        assert!(
            texts.iter().any(|t| t.contains("arrive asynchronously")),
            "got: {texts:?}"
        );
        router.shutdown().await;
    }

    #[tokio::test]
    async fn status_reports_running_state() {
        let sink = RecordingSink::new();
        let mut router = test_router(Arc::clone(&sink));
        router.dispatch("/status", "42").await;
        router.dispatch("/start", "42").await;
        router.dispatch("/status", "42").await;

        let texts = sink.texts();
        assert!(texts[0].contains("Stopped"));
        assert!(texts.last().unwrap().contains("Running"));
        router.shutdown().await;
    }

    #[tokio::test]
    async fn reset_replies_and_leaves_agent_running() {
        let sink = RecordingSink::new();
        let mut router = test_router(Arc::clone(&sink));
        router.dispatch("/start", "42").await;
        router.dispatch("/reset", "42").await;

        let texts = sink.texts();
        assert!(texts.iter().any(|t| t == "reset done"), "got: {texts:?}");
        router.shutdown().await;
    }

    #[test]
    fn outbound_pipeline_strips_dedups_and_suppresses() {
        let agent = ScriptedAgent::new();
        let recent = StdMutex::new(RecentHashes::default());

        let raw = "\x1b[31mline\x1b[0m\nline\ndone";
        let clean = prepare_outbound(raw, &agent, &recent).unwrap();
        assert_eq!(clean, "line\ndone");

        // Exact repeat is suppressed by the rolling hash window
        assert!(prepare_outbound(raw, &agent, &recent).is_none());

        // Agent-level message filter
        assert!(prepare_outbound("SPAM banner", &agent, &recent).is_none());
    }
}
