use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};

/// Default depth of the rolling duplicate-suppression window.
pub const DEFAULT_DEDUP_DEPTH: usize = 10;

/// Rolling window of content hashes for exact-repeat suppression.
///
/// Unsalted hashing with a small window means collisions can suppress a
/// legitimate message; accepted as a heuristic trade-off, and the depth is
/// configurable for callers that disagree.
pub struct RecentHashes {
    hashes: VecDeque<u64>,
    depth: usize,
}

impl RecentHashes {
    pub fn new(depth: usize) -> Self {
        Self {
            hashes: VecDeque::with_capacity(depth),
            depth,
        }
    }

    /// Returns true when `content` repeats something in the window;
    /// otherwise records it and returns false.
    pub fn seen(&mut self, content: &str) -> bool {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        let digest = hasher.finish();

        if self.hashes.contains(&digest) {
            return true;
        }
        if self.hashes.len() == self.depth {
            self.hashes.pop_front();
        }
        self.hashes.push_back(digest);
        false
    }

    pub fn clear(&mut self) {
        self.hashes.clear();
    }
}

impl Default for RecentHashes {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_DEPTH)
    }
}

/// Collapse repeated lines inside one message, keeping the first
/// occurrence of each trimmed line in order.
pub fn dedup_lines(content: &str) -> String {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for line in content.split('\n') {
        let line = line.trim();
        if seen.insert(line.to_string()) {
            kept.push(line);
        }
    }
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exact_repeat_is_suppressed() {
        let mut recent = RecentHashes::default();
        assert!(!recent.seen("build ok"));
        assert!(recent.seen("build ok"));
        assert!(!recent.seen("build failed"));
    }

    #[test]
    fn old_entries_fall_out_of_the_window() {
        let mut recent = RecentHashes::new(2);
        assert!(!recent.seen("a"));
        assert!(!recent.seen("b"));
        assert!(!recent.seen("c")); // evicts "a"
        assert!(!recent.seen("a"));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut recent = RecentHashes::default();
        assert!(!recent.seen("x"));
        recent.clear();
        assert!(!recent.seen("x"));
    }

    #[test]
    fn repeated_lines_keep_first_occurrence_order() {
        let text = "one\ntwo\none\nthree\ntwo";
        assert_eq!(dedup_lines(text), "one\ntwo\nthree");
    }

    #[test]
    fn lines_are_compared_trimmed() {
        let text = "  status  \nstatus\ndone";
        assert_eq!(dedup_lines(text), "status\ndone");
    }
}
