//! Turns the raw decoded byte stream into discrete, filtered messages.
//!
//! The classifier is the only writer of the waiting-for-input state; the
//! session manager clears it on a successful send or a staleness timeout.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::debug;

use crate::filter::{strip_control_sequences, ChunkFilter, PromptDetector};
use crate::queue::OutputQueue;

/// Session lifecycle state. One lock guards all transitions so "safe to
/// close descriptors" is always well-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    WaitingForInput,
    Stopping,
    Dead,
}

impl SessionState {
    /// Running or blocked on input, i.e. a live child exists
    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Running | SessionState::WaitingForInput)
    }
}

/// Cross-boundary state shared between the reader thread and async callers
#[derive(Debug)]
pub(crate) struct SessionShared {
    pub state: SessionState,
    pub input_prompt: String,
    pub prompt_since: Option<Instant>,
    pub queue: OutputQueue,
}

impl SessionShared {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            input_prompt: String::new(),
            prompt_since: None,
            queue: OutputQueue::new(),
        }
    }

    pub fn clear_prompt(&mut self) {
        if self.state == SessionState::WaitingForInput {
            self.state = SessionState::Running;
        }
        self.input_prompt.clear();
        self.prompt_since = None;
    }
}

/// Outcome of classifying one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub accepted: bool,
    pub is_prompt: bool,
}

/// Consumes decoded text chunks from the reader thread: strips control
/// sequences, applies the agent's chunk filter, detects interactive prompts
/// and appends accepted text to the bounded queue.
pub struct OutputClassifier {
    filter: ChunkFilter,
    detector: PromptDetector,
    shared: Arc<Mutex<SessionShared>>,
}

impl OutputClassifier {
    /// Standalone classifier over its own state, treated as an active stream
    pub fn new(filter: ChunkFilter, detector: PromptDetector) -> Self {
        Self::with_shared(
            filter,
            detector,
            Arc::new(Mutex::new(SessionShared::new(SessionState::Running))),
        )
    }

    pub(crate) fn with_shared(
        filter: ChunkFilter,
        detector: PromptDetector,
        shared: Arc<Mutex<SessionShared>>,
    ) -> Self {
        Self {
            filter,
            detector,
            shared,
        }
    }

    pub(crate) fn shared(&self) -> Arc<Mutex<SessionShared>> {
        Arc::clone(&self.shared)
    }

    /// Classify one decoded chunk, updating queue and waiting state.
    /// Malformed byte sequences were already replaced during decoding; no
    /// input can make this panic.
    pub fn classify(&self, raw: &str) -> Verdict {
        let clean = strip_control_sequences(raw);

        if self.filter.should_drop(&clean) {
            return Verdict {
                accepted: false,
                is_prompt: false,
            };
        }

        let prompt = self.detector.detect(&clean);
        let is_prompt = prompt.is_some();

        let mut shared = self.shared.lock().unwrap();
        if let Some(prompt_text) = prompt {
            if shared.state.is_live() {
                debug!(prompt = %prompt_text, "interactive prompt detected");
                shared.state = SessionState::WaitingForInput;
                shared.input_prompt = prompt_text;
                shared.prompt_since = Some(Instant::now());
            }
        }
        shared.queue.push(clean);

        Verdict {
            accepted: true,
            is_prompt,
        }
    }

    /// True while the last detected prompt has not been answered or expired
    pub fn is_waiting_for_input(&self) -> bool {
        self.shared.lock().unwrap().state == SessionState::WaitingForInput
    }

    /// Verbatim text of the last detected prompt
    pub fn input_prompt(&self) -> String {
        self.shared.lock().unwrap().input_prompt.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.lock().unwrap().queue.len()
    }

    /// Drain queued output up to `limit` characters of whole chunks
    pub fn drain_output(&self, limit: usize) -> Option<String> {
        self.shared.lock().unwrap().queue.drain_up_to(limit)
    }
}
