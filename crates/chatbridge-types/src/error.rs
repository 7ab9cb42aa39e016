use thiserror::Error;

/// Error taxonomy shared across the bridge
///
/// Every failure surfaces as a typed result at the dispatch boundary; the
/// router converts these into user-visible text and never panics past it.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("session not running")]
    NotRunning,

    #[error("session already running")]
    AlreadyRunning,

    #[error("process exited during startup: {0}")]
    ProcessDiedImmediately(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("unauthorized sender: {0}")]
    Unauthorized(String),

    #[error("rate limited; wait before sending another message")]
    RateLimited,

    #[error("message too large ({size} > {limit} characters)")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("timed out waiting for a response")]
    ResponseTimeout,
}

impl BridgeError {
    /// Whether the session must be torn down after this error
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(
            self,
            BridgeError::ProcessDiedImmediately(_) | BridgeError::TransportError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_user_readable() {
        assert_eq!(BridgeError::NotRunning.to_string(), "session not running");
        let e = BridgeError::MessageTooLarge { size: 12_000, limit: 10_000 };
        assert!(e.to_string().contains("12000"));
    }

    #[test]
    fn fatal_classification() {
        assert!(BridgeError::ProcessDiedImmediately("exit 1".into()).is_fatal_for_session());
        assert!(!BridgeError::RateLimited.is_fatal_for_session());
        assert!(!BridgeError::NotRunning.is_fatal_for_session());
    }
}
