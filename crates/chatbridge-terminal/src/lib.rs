// PTY session management module
//
// This module provides stateful PTY session support for interactively-scripted
// CLI agents: spawning the agent under a pseudo-terminal, classifying its raw
// output stream into discrete filtered chunks, detecting interactive prompts,
// and tearing down the full process tree on stop.

mod classifier;
mod filter;
mod logger;
mod manager;
#[cfg(unix)]
mod process_tree;
mod queue;
mod session;

// Re-export public API
pub use classifier::{OutputClassifier, SessionState, Verdict};
pub use filter::{strip_control_sequences, ChunkFilter, PromptDetector};
pub use logger::SessionLogger;
pub use manager::{SessionConfig, SessionManager};
pub use queue::OutputQueue;

// Constants
/// Fixed terminal geometry for deterministic rendering
pub const TERM_COLS: u16 = 80;
pub const TERM_ROWS: u16 = 24;

/// Maximum bytes read from the PTY per iteration
pub const READ_BUFFER_SIZE: usize = 4096;

/// How long to wait after spawn before verifying the child survived
pub const START_GRACE_MS: u64 = 500;

/// Settle delay between graceful terminate and force-kill
pub const KILL_SETTLE_MS: u64 = 500;

/// Bounded wait when joining the reader thread during stop
pub const READER_JOIN_TIMEOUT_MS: u64 = 2000;

/// Consecutive read errors tolerated before the reader self-terminates
pub const READ_ERROR_BUDGET: u32 = 10;
