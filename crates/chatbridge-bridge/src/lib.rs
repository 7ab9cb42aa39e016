// Router / bridge layer
//
// Connects one agent to one chat sink: inbound text is authorized,
// rate-limited and dispatched (built-in commands, agent-declared custom
// commands, free text), and agent output is relayed back out through a
// duplicate-suppression pipeline by a background monitor task.

mod dedup;
mod limiter;
mod router;
mod sink;

pub use dedup::{dedup_lines, RecentHashes, DEFAULT_DEDUP_DEPTH};
pub use limiter::RateLimiter;
pub use router::{Router, RouterSettings, MONITOR_POLL_SECS};
pub use sink::{chunk_text, ChatSink};
