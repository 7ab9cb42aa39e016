use std::time::Duration;

/// An agent-specific slash command the router forwards to the session.
#[derive(Debug, Clone)]
pub struct CustomCommand {
    pub name: String,
    pub description: String,
    /// First line of the reply sent back to the user once the command has
    /// been forwarded.
    pub confirmation: String,
}

impl CustomCommand {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        confirmation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            confirmation: confirmation.into(),
        }
    }
}

/// Everything that distinguishes one PTY-backed CLI agent from another:
/// how to launch it, which output chunks to keep, which slash commands it
/// understands, and how aggressively to suppress its UI chrome.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub name: String,
    pub command: Vec<String>,
    /// Chunks matching these keywords survive the UI filter even when they
    /// look like box-drawing noise.
    pub welcome_keywords: Vec<String>,
    pub mode_keywords: Vec<String>,
    /// Overrides the built-in prompt patterns when set.
    pub prompt_patterns: Option<Vec<String>>,
    pub custom_commands: Vec<CustomCommand>,
    pub custom_help: String,
    /// Substrings counted toward a message's UI score.
    pub ui_indicators: Vec<String>,
    /// A message containing any of these is a real agent response and is
    /// never filtered as repetitive UI.
    pub response_markers: Vec<String>,
    /// Indicators that mark a message as repeated UI chrome.
    pub repetition_markers: Vec<String>,
    pub response_timeout: Duration,
}

impl AgentProfile {
    /// A bare profile with no filtering heuristics, suitable for agents
    /// whose output is already clean.
    pub fn plain(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
            welcome_keywords: Vec::new(),
            mode_keywords: Vec::new(),
            prompt_patterns: None,
            custom_commands: Vec::new(),
            custom_help: String::new(),
            ui_indicators: Vec::new(),
            response_markers: Vec::new(),
            repetition_markers: Vec::new(),
            response_timeout: Duration::from_secs(1),
        }
    }

    pub fn cline() -> Self {
        Self {
            name: "Cline".to_string(),
            command: vec!["cline".to_string()],
            welcome_keywords: vec!["cline cli".to_string()],
            mode_keywords: vec![
                "switch to plan".to_string(),
                "switch to act".to_string(),
                "plan mode".to_string(),
                "act mode".to_string(),
            ],
            prompt_patterns: None,
            custom_commands: vec![
                CustomCommand::new(
                    "/plan",
                    "Switch to plan mode - Cline will plan before executing",
                    "\u{1F4CB} Switched to Plan Mode",
                ),
                CustomCommand::new(
                    "/act",
                    "Switch to act mode - Cline will execute immediately",
                    "\u{26A1} Switched to Act Mode",
                ),
            ],
            custom_help: CLINE_HELP.to_string(),
            ui_indicators: vec![
                "\u{256D}".to_string(),
                "\u{2570}".to_string(),
                "\u{2502}".to_string(),
                "\u{2503}".to_string(),
                "/plan or /act".to_string(),
            ],
            response_markers: vec!["###".to_string()],
            repetition_markers: vec!["/plan or /act".to_string()],
            response_timeout: Duration::from_secs(1),
        }
    }

    pub fn codex_cli() -> Self {
        Self::plain("Codex CLI", vec!["codex".to_string()])
    }

    /// Message-level UI spam detection.
    ///
    /// A message is dropped when it reads as repeated UI chrome (high
    /// indicator score relative to its word count) and carries no response
    /// marker, or when it is short and consists almost entirely of
    /// indicators.
    pub fn should_filter_message(&self, content: &str) -> bool {
        if self.ui_indicators.is_empty() {
            return false;
        }

        let ui_score = self
            .ui_indicators
            .iter()
            .filter(|ind| content.contains(ind.as_str()))
            .count();
        let is_response = self
            .response_markers
            .iter()
            .any(|m| content.contains(m.as_str()));
        let is_repetitive_ui = ui_score >= 1
            && self
                .repetition_markers
                .iter()
                .any(|m| content.contains(m.as_str()));

        let trimmed_len = content.trim().chars().count();
        let word_count = content.split_whitespace().count().max(1);
        let ui_ratio = ui_score as f64 / word_count as f64;
        let is_mostly_ui = ui_ratio > 0.3 || (ui_score >= 2 && trimmed_len <= 100);
        let high_ui_score = ui_score >= 3 && trimmed_len <= 50;

        (is_repetitive_ui && !is_response && is_mostly_ui) || high_ui_score
    }
}

const CLINE_HELP: &str = "\n\n**Cline Mode Switching:**\n\
\u{2022} `/plan` - Enable plan mode (Cline thinks before acting)\n\
\u{2022} `/act` - Enable act mode (Cline executes immediately)\n\n\
**Usage Examples:**\n\
\u{2022} \"Show me all Python files in this directory\"\n\
\u{2022} \"Create a README.md with project description\"\n\
\u{2022} \"Fix any syntax errors in src/main.py\"\n\
\u{2022} \"What's the current git status?\"\n\n\
**Tips:**\n\
\u{2022} Cline works best with clear, specific instructions\n\
\u{2022} Use full context: \"In the api/ directory, create...\"\n\
\u{2022} Chain requests: \"First check git status, then commit my changes\"\n\
\u{2022} Send shell commands directly: `git status`, `ls -la`, `pwd`\n\n\
**Cline will execute commands in your project directory**\n";
