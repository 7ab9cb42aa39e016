//! Control-sequence stripping, chunk filtering and prompt detection.
//!
//! All three are pure text predicates: the classifier wires them to the queue
//! and waiting-state side effects.

use regex::Regex;
use std::sync::OnceLock;

/// Remove terminal control/escape sequences: CSI terminated by a byte in
/// 0x40-0x7E, ESC + intermediates + final (charset designations like
/// `ESC ( B`), and ESC + two-char finals. Idempotent; never fails.
pub fn strip_control_sequences(text: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| {
        Regex::new(r"\x1B(?:\[[0-?]*[ -/]*[@-~]|[ -/]+[0-~]|[@-Z\\-_])").expect("ansi pattern")
    });
    re.replace_all(text, "").into_owned()
}

fn box_line_pattern() -> &'static Regex {
    static BOX_LINE: OnceLock<Regex> = OnceLock::new();
    BOX_LINE.get_or_init(|| Regex::new(r"^[\s│┃╭╰╮╯]+$").expect("box pattern"))
}

/// Chunk-level filter applied by the classifier before queueing.
///
/// Suppresses structural chrome (bare box-drawing fragments) while always
/// keeping chunks matching the agent's welcome/mode keywords. Ambiguous
/// chunks are kept: losing genuine output outweighs occasional noise.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    welcome_keywords: Vec<String>,
    mode_keywords: Vec<String>,
}

impl ChunkFilter {
    pub fn new(welcome_keywords: Vec<String>, mode_keywords: Vec<String>) -> Self {
        Self {
            welcome_keywords: welcome_keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            mode_keywords: mode_keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Returns true when the chunk should be dropped
    pub fn should_drop(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        if self.welcome_keywords.iter().any(|k| lower.contains(k)) {
            return false;
        }
        if self.mode_keywords.iter().any(|k| lower.contains(k)) {
            return false;
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return true;
        }
        // Short banner fragments: nothing but box-drawing characters and space
        box_line_pattern().is_match(trimmed) && trimmed.chars().count() <= 3
    }
}

/// End-anchored interactive-prompt detection.
///
/// Patterns are tested in priority order against the trimmed tail of the
/// chunk; anchoring to end-of-text keeps mid-text mentions from misfiring.
/// The generic trailing-bracket fallback is permissive, so profiles for
/// agents with rich bracketed status lines can supply their own list.
#[derive(Debug, Clone)]
pub struct PromptDetector {
    patterns: Vec<Regex>,
}

impl PromptDetector {
    /// Default pattern set, ordered: confirmation brackets, question words,
    /// field prompts, press-enter variants, generic bracketed-token fallback.
    pub fn default_patterns() -> Vec<&'static str> {
        vec![
            r"(?i)\[y/n\]\s*$",
            r"(?i)\(y/n\)\s*$",
            r"(?i)continue\?\s*$",
            r"(?i)proceed\?\s*$",
            r"(?i)are you sure\?\s*$",
            r"(?i)enter .*:\s*$",
            r"(?i)password:\s*$",
            r"(?i)press.*enter.*to.*continue\s*$",
            r"(?i)press.*any.*key\s*$",
            r"(?i)press .*to exit\s*$",
            r"(?i)press .* to return\s*$",
            r"[\[(][^\n]*[\])]\s*$",
        ]
    }

    pub fn new() -> Self {
        Self::with_patterns(&Self::default_patterns()).expect("default prompt patterns")
    }

    /// Build a detector from agent-supplied patterns
    pub fn with_patterns(patterns: &[&str]) -> anyhow::Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Test the chunk against the pattern list; on a match returns the
    /// verbatim trimmed prompt text.
    pub fn detect(&self, text: &str) -> Option<String> {
        let tail = text.trim_end();
        if tail.is_empty() {
            return None;
        }
        for pattern in &self.patterns {
            if pattern.is_match(tail) {
                return Some(text.trim().to_string());
            }
        }
        None
    }
}

impl Default for PromptDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_csi_and_two_char_sequences() {
        let raw = "\x1b[1;32mok\x1b[0m\x1b(Bdone";
        assert_eq!(strip_control_sequences(raw), "okdone");
    }

    #[test]
    fn strips_charset_designation_sequences() {
        // xterm-256color agents emit these around line-drawing output
        assert_eq!(strip_control_sequences("ok\x1b(Bdone"), "okdone");
        assert_eq!(strip_control_sequences("\x1b(0lqqk\x1b(B"), "lqqk");
    }

    #[test]
    fn stripping_is_idempotent() {
        let raw = "\x1b[2J\x1b[Hprompt> ";
        let once = strip_control_sequences(raw);
        let twice = strip_control_sequences(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn malformed_sequences_treated_as_text() {
        // Bare ESC with no recognizable final byte passes through unchanged
        let raw = "text \x1b";
        assert_eq!(strip_control_sequences(raw), "text \x1b");
    }

    #[test]
    fn drops_bare_box_fragment_keeps_real_content() {
        let filter = ChunkFilter::default();
        assert!(filter.should_drop("┃"));
        assert!(filter.should_drop("  ╭╮ "));
        assert!(!filter.should_drop("┃ Build succeeded ┃"));
    }

    #[test]
    fn keyword_chunks_always_kept() {
        let filter = ChunkFilter::new(
            vec!["cline cli".into()],
            vec!["plan mode".into()],
        );
        // These would otherwise be short enough to look like chrome
        assert!(!filter.should_drop("Cline CLI"));
        assert!(!filter.should_drop("plan mode"));
        assert!(filter.should_drop("│"));
    }

    #[test]
    fn detects_end_anchored_confirmation() {
        let det = PromptDetector::new();
        assert_eq!(det.detect("Continue? (y/n)").as_deref(), Some("Continue? (y/n)"));
        assert_eq!(det.detect("Overwrite file? [y/N]").as_deref(), Some("Overwrite file? [y/N]"));
        assert!(det.detect("Enter your name: ").is_some());
        assert!(det.detect("Press Enter to continue").is_some());
    }

    #[test]
    fn mid_text_mention_does_not_fire() {
        let det = PromptDetector::new();
        assert!(det.detect("it asked Continue? earlier but moved on").is_none());
        assert!(det.detect("saw a [y/N] prompt and answered it already").is_none());
    }

    #[test]
    fn generic_bracket_fallback_fires_on_trailing_token() {
        let det = PromptDetector::new();
        assert!(det.detect("Select an option [1-5]").is_some());
        assert!(det.detect("no brackets here at all").is_none());
    }

    #[test]
    fn custom_pattern_list_replaces_defaults() {
        let det = PromptDetector::with_patterns(&[r"(?i)approve\?\s*$"]).unwrap();
        assert!(det.detect("Approve?").is_some());
        // Default fallback gone: bracketed status lines no longer misfire
        assert!(det.detect("running [3/7]").is_none());
    }
}
