use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Entries untouched for this long are dropped.
const PURGE_IDLE: Duration = Duration::from_secs(24 * 60 * 60);
/// Minimum spacing between purge sweeps.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Per-sender minimum-interval rate limiter.
pub struct RateLimiter {
    min_interval: Duration,
    last_seen: HashMap<String, Instant>,
    last_purge: Instant,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_seen: HashMap::new(),
            last_purge: Instant::now(),
        }
    }

    /// Whether `sender` may send now. An accepted message updates the
    /// sender's timestamp; a rejected one does not, so a sender cannot
    /// starve themselves by retrying early.
    pub fn check(&mut self, sender: &str) -> bool {
        let now = Instant::now();
        self.maybe_purge(now);

        if let Some(last) = self.last_seen.get(sender) {
            if now.duration_since(*last) < self.min_interval {
                return false;
            }
        }
        self.last_seen.insert(sender.to_string(), now);
        true
    }

    fn maybe_purge(&mut self, now: Instant) {
        if now.duration_since(self.last_purge) < PURGE_INTERVAL {
            return;
        }
        self.last_seen
            .retain(|_, last| now.duration_since(*last) < PURGE_IDLE);
        self.last_purge = now;
    }

    #[cfg(test)]
    fn tracked_senders(&self) -> usize {
        self.last_seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_message_inside_interval_is_rejected() {
        let mut limiter = RateLimiter::new(Duration::from_millis(500));
        assert!(limiter.check("42"));
        assert!(!limiter.check("42"));
    }

    #[test]
    fn message_after_interval_is_accepted() {
        let mut limiter = RateLimiter::new(Duration::from_millis(10));
        assert!(limiter.check("42"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("42"));
    }

    #[test]
    fn senders_are_limited_independently() {
        let mut limiter = RateLimiter::new(Duration::from_millis(500));
        assert!(limiter.check("42"));
        assert!(limiter.check("43"));
        assert_eq!(limiter.tracked_senders(), 2);
    }

    #[test]
    fn rejected_message_does_not_reset_the_window() {
        let mut limiter = RateLimiter::new(Duration::from_millis(300));
        assert!(limiter.check("42"));
        std::thread::sleep(Duration::from_millis(100));
        assert!(!limiter.check("42"));
        std::thread::sleep(Duration::from_millis(250));
        // 350ms since the accepted message, so the window has passed
        assert!(limiter.check("42"));
    }
}
