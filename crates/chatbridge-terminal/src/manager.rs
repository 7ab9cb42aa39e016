//! Session manager: full lifecycle of one PTY-driven agent process.
//!
//! Owns the raw stream source and its reader thread, and is the only place
//! that closes descriptors or signals the child. The reader thread and the
//! async side share nothing but the queue/state block behind one mutex.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use chatbridge_types::{BridgeError, PROMPT_STALE_SECS};

use crate::classifier::{OutputClassifier, SessionShared, SessionState};
use crate::filter::{ChunkFilter, PromptDetector};
use crate::logger::SessionLogger;
use crate::session::PtySession;
use crate::{KILL_SETTLE_MS, READER_JOIN_TIMEOUT_MS, START_GRACE_MS, TERM_COLS, TERM_ROWS};

/// Immutable description of what to spawn and how to classify its output
pub struct SessionConfig {
    /// Program and arguments, e.g. ["cline"]
    pub command: Vec<String>,
    /// Display name, used for logging and transcripts
    pub name: String,
    pub filter: ChunkFilter,
    pub detector: PromptDetector,
    /// Transcript directory; None disables transcript logging
    pub log_dir: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(command: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            command,
            name: name.into(),
            filter: ChunkFilter::default(),
            detector: PromptDetector::new(),
            log_dir: None,
        }
    }
}

pub struct SessionManager {
    config: SessionConfig,
    shared: Arc<Mutex<SessionShared>>,
    session: Option<PtySession>,
    logger: Option<Arc<Mutex<SessionLogger>>>,
    // Serializes terminal writes so concurrent dispatches cannot interleave
    send_lock: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Mutex::new(SessionShared::new(SessionState::Idle))),
            session: None,
            logger: None,
            send_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Start the configured command under a fresh PTY.
    ///
    /// Returns Ok(false) without side effects when a session is already
    /// live. A child that exits within the grace period releases every
    /// resource and fails with `ProcessDiedImmediately`.
    pub async fn start(&mut self) -> Result<bool, BridgeError> {
        {
            let mut shared = self.shared.lock().unwrap();
            if shared.state.is_live() || shared.state == SessionState::Starting {
                return Ok(false);
            }
            shared.state = SessionState::Starting;
            shared.queue.clear();
            shared.clear_prompt();
        }

        // A session left behind by a dead child still owns the terminal pair
        // and any surviving descendants; tear it down before replacing it
        if let Some(old) = self.session.take() {
            self.teardown_session(old).await;
        }

        let mut session = match PtySession::spawn(&self.config.command, TERM_COLS, TERM_ROWS) {
            Ok(session) => session,
            Err(e) => {
                self.set_state(SessionState::Idle);
                return Err(BridgeError::TransportError(e.to_string()));
            }
        };

        // Grace period: an agent with a bad flag or missing config tends to
        // die within the first half second
        tokio::time::sleep(Duration::from_millis(START_GRACE_MS)).await;
        if let Some(status) = session.try_wait() {
            self.set_state(SessionState::Idle);
            drop(session);
            return Err(BridgeError::ProcessDiedImmediately(format!(
                "{} exited with status {}",
                self.config.name,
                status.exit_code()
            )));
        }

        let logger = match &self.config.log_dir {
            Some(dir) => match SessionLogger::new(dir, &self.config.name) {
                Ok(logger) => Some(Arc::new(Mutex::new(logger))),
                Err(e) => {
                    warn!(error = %e, "transcript logging disabled");
                    None
                }
            },
            None => None,
        };

        let classifier = OutputClassifier::with_shared(
            self.config.filter.clone(),
            self.config.detector.clone(),
            Arc::clone(&self.shared),
        );
        if let Err(e) = session.start_reader(classifier, logger.clone()) {
            self.teardown_session(session).await;
            return Err(BridgeError::TransportError(e.to_string()));
        }

        info!(name = %self.config.name, pid = ?session.root_pid(), "session started");
        self.session = Some(session);
        self.logger = logger;
        self.set_state(SessionState::Running);
        Ok(true)
    }

    /// Tear the session down. Idempotent: stopping a stopped session is a
    /// no-op that leaves the manager Idle.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            self.reset_to_idle();
            return;
        };
        self.set_state(SessionState::Stopping);
        self.teardown_session(session).await;
        self.reset_to_idle();
        info!(name = %self.config.name, "session stopped");
    }

    /// Send one command line to the agent.
    ///
    /// Clears waiting-for-input (stale or answered) before writing; the
    /// write is `command` plus CRLF. A child found dead here flips the
    /// session to Dead and the send degrades to `NotRunning`.
    pub async fn send(&mut self, command: &str) -> Result<(), BridgeError> {
        let _guard = self.send_lock.lock().await;

        {
            let mut shared = self.shared.lock().unwrap();
            if !shared.state.is_live() {
                return Err(BridgeError::NotRunning);
            }
            if shared.state == SessionState::WaitingForInput {
                let stale = shared
                    .prompt_since
                    .map(|since| since.elapsed() > Duration::from_secs(PROMPT_STALE_SECS))
                    .unwrap_or(false);
                if stale {
                    warn!(prompt = %shared.input_prompt, "clearing stale input prompt");
                }
            }
            shared.clear_prompt();
        }

        let shared = Arc::clone(&self.shared);
        let session = self.session.as_mut().ok_or(BridgeError::NotRunning)?;
        if session.try_wait().is_some() {
            shared.lock().unwrap().state = SessionState::Dead;
            return Err(BridgeError::NotRunning);
        }

        let payload = format!("{command}\r\n");
        if let Some(ref logger) = self.logger {
            if let Ok(mut logger) = logger.lock() {
                let _ = logger.log_input(&payload);
            }
        }
        session.write_bytes(payload.as_bytes()).map_err(|e| {
            shared.lock().unwrap().state = SessionState::Dead;
            BridgeError::TransportError(e.to_string())
        })?;
        Ok(())
    }

    /// Write a literal interrupt byte (Ctrl+C) straight to the terminal,
    /// bypassing the command lock: cancellation must land regardless of
    /// what is mid-flight.
    pub fn interrupt(&mut self) -> Result<(), BridgeError> {
        if !self.state().is_live() {
            return Err(BridgeError::NotRunning);
        }
        let session = self.session.as_mut().ok_or(BridgeError::NotRunning)?;
        session
            .write_bytes(b"\x03")
            .map_err(|e| BridgeError::TransportError(e.to_string()))
    }

    /// Drain queued output up to `limit` characters of whole chunks
    pub fn drain_output(&self, limit: usize) -> Option<String> {
        self.shared.lock().unwrap().queue.drain_up_to(limit)
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().unwrap().state
    }

    pub fn is_running(&self) -> bool {
        self.state().is_live()
    }

    pub fn is_waiting_for_input(&self) -> bool {
        self.state() == SessionState::WaitingForInput
    }

    pub fn input_prompt(&self) -> String {
        self.shared.lock().unwrap().input_prompt.clone()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    fn set_state(&self, state: SessionState) {
        self.shared.lock().unwrap().state = state;
    }

    fn reset_to_idle(&mut self) {
        let mut shared = self.shared.lock().unwrap();
        shared.queue.clear();
        shared.clear_prompt();
        shared.state = SessionState::Idle;
        drop(shared);
        self.logger = None;
    }

    /// Two-phase kill of the whole descendant tree, then reader join with a
    /// bounded wait, then descriptor close (by dropping the session).
    async fn teardown_session(&mut self, mut session: PtySession) {
        session.signal_stop();

        #[cfg(unix)]
        if let Some(root) = session.root_pid() {
            let targets = crate::process_tree::signal_tree(root, nix::sys::signal::Signal::SIGTERM);
            tokio::time::sleep(Duration::from_millis(KILL_SETTLE_MS)).await;
            crate::process_tree::force_kill_survivors(&targets);
        }
        #[cfg(not(unix))]
        {
            let _ = session.kill_child();
        }

        // Reap the child so it does not linger as a zombie
        let deadline = Instant::now() + Duration::from_millis(READER_JOIN_TIMEOUT_MS);
        while session.try_wait().is_none() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        // The reader sees EOF once the child is gone; give it a bounded
        // window, then abandon the handle rather than block teardown
        while !session.reader_finished() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        session.reap_reader();
        drop(session);
    }
}
