//! Core types and structures for chatbridge
//!
//! This crate provides the foundational types used across all chatbridge crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod error;
pub use error::BridgeError;

// ============================================================================
// Constants
// ============================================================================

/// Bounded output queue capacity; oldest entries are evicted on overflow
pub const OUTPUT_QUEUE_CAPACITY: usize = 100;

/// Maximum payload returned by a single `get_output` drain (transport ceiling)
pub const TRANSPORT_CHUNK_LIMIT: usize = 4000;

/// Maximum accepted inbound message length
pub const MAX_MESSAGE_LENGTH: usize = 10_000;

/// Minimum interval between accepted messages from one sender
pub const RATE_LIMIT_MS: u64 = 500;

/// A recorded waiting-for-input condition older than this is considered stale
pub const PROMPT_STALE_SECS: u64 = 30;

// ============================================================================
// Message Types
// ============================================================================

/// Classification of messages exchanged between agents and the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    UserInput,
    AgentOutput,
    Command,
    Error,
    ToolCall,
    ToolResult,
}

/// Immutable message value exchanged between an agent and the router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_type: MessageType,
    pub content: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl ChatMessage {
    pub fn new(message_type: MessageType, content: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            message_type,
            content: content.into(),
            sender: sender.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn agent_output(content: impl Into<String>, sender: impl Into<String>) -> Self {
        Self::new(MessageType::AgentOutput, content, sender)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Conversation Turns (API-backed agents)
// ============================================================================

/// A single role-tagged turn in an API agent's conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chat_message_carries_sender_and_type() {
        let msg = ChatMessage::agent_output("build finished", "Cline");
        assert_eq!(msg.message_type, MessageType::AgentOutput);
        assert_eq!(msg.content, "build finished");
        assert_eq!(msg.sender, "Cline");
        assert!(msg.metadata.is_empty());
    }

    #[test]
    fn metadata_builder_accumulates() {
        let msg = ChatMessage::new(MessageType::Command, "/plan", "user")
            .with_metadata("origin", "dispatch")
            .with_metadata("raw", "/plan");
        assert_eq!(msg.metadata.len(), 2);
        assert_eq!(msg.metadata["origin"], "dispatch");
    }

    #[test]
    fn conversation_turn_roles() {
        assert_eq!(ConversationTurn::user("hi").role, "user");
        assert_eq!(ConversationTurn::assistant("hello").role, "assistant");
    }
}
