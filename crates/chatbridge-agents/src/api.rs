use std::time::Duration;

use async_trait::async_trait;
use chatbridge_terminal::OutputQueue;
use chatbridge_types::{ChatMessage, ConversationTurn, TRANSPORT_CHUNK_LIMIT};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::agent::Agent;

/// Replies an API agent has produced but the router has not yet relayed.
const API_QUEUE_CAPACITY: usize = 50;

/// Which wire dialect the remote endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiProvider {
    /// Anthropic messages API: `x-api-key` auth, reply in `content[0].text`.
    Anthropic,
    /// OpenAI chat completions: bearer auth, reply in
    /// `choices[0].message.content`.
    OpenAi,
    /// Unauthenticated local endpoint with an Anthropic-shaped reply,
    /// falling back to a bare `message` field.
    Local,
}

impl ApiProvider {
    /// Pull the assistant's reply out of a successful response body.
    pub fn extract_reply(&self, data: &Value) -> Option<String> {
        match self {
            ApiProvider::Anthropic => data["content"][0]["text"]
                .as_str()
                .map(str::to_string),
            ApiProvider::OpenAi => data["choices"][0]["message"]["content"]
                .as_str()
                .map(str::to_string),
            ApiProvider::Local => data["content"][0]["text"]
                .as_str()
                .map(str::to_string)
                .or_else(|| data["message"].as_str().map(str::to_string))
                .or_else(|| Some(data.to_string())),
        }
    }
}

/// An agent backed by a remote chat-completion endpoint instead of a local
/// process. Conversation state lives entirely on this side: the full turn
/// history is replayed on every request.
pub struct ApiAgent {
    name: String,
    provider: ApiProvider,
    api_url: String,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: u32,
    request_timeout: Duration,
    client: reqwest::Client,
    running: bool,
    history: Vec<ConversationTurn>,
    queue: OutputQueue,
}

impl ApiAgent {
    pub fn anthropic(api_key: String, api_url: Option<String>, model: Option<String>) -> Self {
        Self::build(
            "Claude API",
            ApiProvider::Anthropic,
            api_url.unwrap_or_else(|| "https://api.anthropic.com/v1/messages".to_string()),
            Some(api_key),
            Some(model.unwrap_or_else(|| "claude-3-5-sonnet-20241022".to_string())),
            1024,
            Duration::from_secs(30),
        )
    }

    pub fn openai(api_key: String, api_url: Option<String>, model: Option<String>) -> Self {
        Self::build(
            "OpenAI API",
            ApiProvider::OpenAi,
            api_url.unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string()),
            Some(api_key),
            Some(model.unwrap_or_else(|| "gpt-4-turbo".to_string())),
            1024,
            Duration::from_secs(30),
        )
    }

    pub fn local(api_url: Option<String>, model: Option<String>) -> Self {
        Self::build(
            "Codex API",
            ApiProvider::Local,
            api_url.unwrap_or_else(|| "http://localhost:8000/v1/messages".to_string()),
            None,
            model,
            2048,
            Duration::from_secs(60),
        )
    }

    fn build(
        name: &str,
        provider: ApiProvider,
        api_url: String,
        api_key: Option<String>,
        model: Option<String>,
        max_tokens: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            provider,
            api_url,
            api_key,
            model,
            max_tokens,
            request_timeout,
            client: reqwest::Client::new(),
            running: false,
            history: Vec::new(),
            queue: OutputQueue::with_capacity(API_QUEUE_CAPACITY),
        }
    }

    #[cfg(test)]
    fn history_len(&self) -> usize {
        self.history.len()
    }

    async fn call_api(&self) -> anyhow::Result<String> {
        let mut body = json!({
            "messages": self.history,
            "max_tokens": self.max_tokens,
        });
        if let Some(model) = &self.model {
            body["model"] = json!(model);
        }

        let mut request = self
            .client
            .post(&self.api_url)
            .timeout(self.request_timeout)
            .json(&body);
        request = match (&self.provider, &self.api_key) {
            (ApiProvider::Anthropic, Some(key)) => request
                .header("x-api-key", key)
                .header("anthropic-version", "2023-06-01"),
            (ApiProvider::OpenAi, Some(key)) => request.bearer_auth(key),
            _ => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("API error: {status} - {text}");
        }

        let data: Value = response.json().await?;
        self.provider
            .extract_reply(&data)
            .ok_or_else(|| anyhow::anyhow!("unrecognized response shape"))
    }
}

#[async_trait]
impl Agent for ApiAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> bool {
        self.running = true;
        self.history.clear();
        info!(agent = %self.name, "API session started");
        true
    }

    async fn stop(&mut self) {
        self.running = false;
        self.history.clear();
        info!(agent = %self.name, "API session stopped");
    }

    async fn send_command(&mut self, command: &str) -> String {
        if !self.running {
            return format!("Error: {} not running", self.name);
        }

        self.history.push(ConversationTurn::user(command));
        match self.call_api().await {
            Ok(reply) => {
                self.history.push(ConversationTurn::assistant(reply.clone()));
                self.queue.push(format!("{reply}\n"));
                "Message sent".to_string()
            }
            Err(e) => {
                // Failed turns must not poison the replayed history
                self.history.pop();
                error!(agent = %self.name, error = %e, "API request failed");
                format!("Error: {e}")
            }
        }
    }

    async fn get_output(&mut self) -> Option<ChatMessage> {
        self.queue
            .drain_up_to(TRANSPORT_CHUNK_LIMIT)
            .map(|content| ChatMessage::agent_output(content, &self.name))
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn handle_custom_command(&mut self, _command: &str) -> Option<String> {
        None
    }

    async fn cancel(&mut self) -> String {
        format!("\u{1F6D1} Cancelled current {} operation", self.name)
    }

    async fn reset(&mut self) -> String {
        self.history.clear();
        format!(
            "\u{1F504} **{} Reset Complete**\n\n\
             \u{2705} Conversation history cleared\n\
             \u{2705} Agent state reset",
            self.name
        )
    }

    fn response_timeout(&self) -> Duration {
        self.request_timeout
    }
}
