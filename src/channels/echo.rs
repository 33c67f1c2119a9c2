use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How long a recorded send can still be matched as an echo.
pub const ECHO_WINDOW: Duration = Duration::from_secs(30);

/// Fingerprint length in characters. The bridge re-captures sent text via
/// clipboard/OCR, which can mangle trailing characters but rarely leading
/// ones, so a short prefix is more reliable than the full content.
const PREFIX_CHARS: usize = 20;

/// Bounded, time-windowed record of recently transmitted messages, used to
/// recognize the channel's own sends when the bridge echoes them back as
/// `is_self` messages.
#[derive(Debug, Default)]
pub struct SendTracker {
    entries: HashMap<(String, String), Instant>,
}

fn fingerprint(content: &str) -> String {
    content.chars().take(PREFIX_CHARS).collect()
}

impl SendTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a send so the matching echo can be suppressed later.
    pub fn record(&mut self, conversation_id: &str, content: &str) {
        self.entries.insert(
            (conversation_id.to_string(), fingerprint(content)),
            Instant::now(),
        );
    }

    /// Whether `content` is the echo of a recent send to `conversation_id`.
    ///
    /// Sweeps expired entries first, then removes the matched entry so the
    /// same fingerprint cannot suppress two distinct echoes.
    pub fn is_echo(&mut self, conversation_id: &str, content: &str) -> bool {
        let now = Instant::now();
        self.entries
            .retain(|_, sent_at| now.duration_since(*sent_at) < ECHO_WINDOW);

        let key = (conversation_id.to_string(), fingerprint(content));
        self.entries.remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn record_at(&mut self, conversation_id: &str, content: &str, sent_at: Instant) {
        self.entries.insert(
            (conversation_id.to_string(), fingerprint(content)),
            sent_at,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_matches_once_then_never_again() {
        let mut tracker = SendTracker::new();
        tracker.record("chat1", "Result: 42 and some longer tail");

        assert!(tracker.is_echo("chat1", "Result: 42 and some longer tail"));
        // Single-use: a second identical self-observation is not an echo
        assert!(!tracker.is_echo("chat1", "Result: 42 and some longer tail"));
    }

    #[test]
    fn echo_tolerates_altered_tail() {
        let mut tracker = SendTracker::new();
        tracker.record("chat1", "Result: 42 plus trailing text");

        // OCR/clipboard re-capture altered everything past the prefix
        assert!(tracker.is_echo("chat1", "Result: 42 plus traXXX GARBAGE"));
    }

    #[test]
    fn different_conversation_does_not_match() {
        let mut tracker = SendTracker::new();
        tracker.record("chat1", "hello there");
        assert!(!tracker.is_echo("chat2", "hello there"));
        // The entry for chat1 is still intact
        assert!(tracker.is_echo("chat1", "hello there"));
    }

    #[test]
    fn different_prefix_does_not_match() {
        let mut tracker = SendTracker::new();
        tracker.record("chat1", "hello there friend, how are you");
        assert!(!tracker.is_echo("chat1", "goodbye there friend, how are you"));
    }

    fn stale_instant() -> Instant {
        Instant::now()
            .checked_sub(ECHO_WINDOW + Duration::from_secs(1))
            .expect("system uptime exceeds the echo window")
    }

    #[test]
    fn expired_entries_are_swept_not_matched() {
        let mut tracker = SendTracker::new();
        tracker.record_at("chat1", "old message content here", stale_instant());

        assert!(!tracker.is_echo("chat1", "old message content here"));
        // Eager removal: the sweep dropped the entry entirely
        assert!(tracker.is_empty());
    }

    #[test]
    fn sweep_removes_stale_entries_even_without_match() {
        let mut tracker = SendTracker::new();
        tracker.record_at("chat1", "stale one", stale_instant());
        tracker.record("chat2", "fresh one");

        assert!(!tracker.is_echo("chat3", "unrelated"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn multibyte_prefix_compares_by_chars() {
        let mut tracker = SendTracker::new();
        let cjk = "你好世界你好世界你好世界你好世界你好世界 tail";
        tracker.record("chat1", cjk);
        assert!(tracker.is_echo("chat1", cjk));
    }

    #[test]
    fn short_content_uses_whole_text_as_fingerprint() {
        let mut tracker = SendTracker::new();
        tracker.record("chat1", "ok");
        assert!(!tracker.is_echo("chat1", "ok then"));
        assert!(tracker.is_echo("chat1", "ok"));
    }
}
