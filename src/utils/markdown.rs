//! Markdown → plain text conversion for the WeChat surface.
//!
//! WeChat renders no markup, so replies are flattened before sending. The
//! rule order is a contract: fenced code blocks must be unwrapped before
//! emphasis stripping, or code containing `*` / `_` gets mangled.

use regex::Regex;
use std::sync::LazyLock;

macro_rules! rule {
    ($name:ident, $pattern:literal) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect(concat!("compile ", stringify!($name))));
    };
}

rule!(FENCED_CODE, r"(?s)```[^\n]*\n(.*?)```");
rule!(INLINE_CODE, r"`([^`]+)`");
rule!(IMAGE, r"!\[([^\]]*)\]\([^)]+\)");
rule!(LINK, r"\[([^\]]+)\]\([^)]+\)");
rule!(BOLD_ITALIC_STAR, r"\*{3}(.+?)\*{3}");
rule!(BOLD_ITALIC_UNDER, r"_{3}(.+?)_{3}");
rule!(BOLD_STAR, r"\*{2}(.+?)\*{2}");
rule!(BOLD_UNDER, r"_{2}(.+?)_{2}");
rule!(ITALIC_STAR, r"\*(.+?)\*");
// Word-boundary guard keeps identifiers like snake_case_names intact
rule!(ITALIC_UNDER, r"\b_(.+?)_\b");
rule!(STRIKE, r"~~(.+?)~~");
rule!(HEADING, r"(?m)^#{1,6}\s+");
rule!(BLOCKQUOTE, r"(?m)^>\s?");
rule!(HORIZONTAL_RULE, r"(?m)^[-*_]{3,}\s*$");
rule!(BLANK_LINES, r"\n{3,}");

/// Convert marked-up text into plain text. Pure and deterministic; malformed
/// markup degrades gracefully (unmatched markers stay as literal characters).
pub fn strip_markdown(text: &str) -> String {
    let text = FENCED_CODE.replace_all(text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = BOLD_ITALIC_STAR.replace_all(&text, "$1");
    let text = BOLD_ITALIC_UNDER.replace_all(&text, "$1");
    let text = BOLD_STAR.replace_all(&text, "$1");
    let text = BOLD_UNDER.replace_all(&text, "$1");
    let text = ITALIC_STAR.replace_all(&text, "$1");
    let text = ITALIC_UNDER.replace_all(&text, "$1");
    let text = STRIKE.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = HORIZONTAL_RULE.replace_all(&text, "");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_code_block_unwrapped() {
        assert_eq!(
            strip_markdown("```rust\nlet x = 1;\n```"),
            "let x = 1;"
        );
    }

    #[test]
    fn code_block_protects_emphasis_markers() {
        // Order contract: the block body is unwrapped before emphasis rules
        // run, so `*` inside code survives as a literal
        assert_eq!(strip_markdown("```\na * b * c\n```"), "a * b * c");
    }

    #[test]
    fn inline_code_unwrapped() {
        assert_eq!(strip_markdown("use `cargo build` here"), "use cargo build here");
    }

    #[test]
    fn image_replaced_by_alt_text() {
        assert_eq!(strip_markdown("![a chart](http://x/y.png)"), "a chart");
        assert_eq!(strip_markdown("![](http://x/y.png)"), "");
    }

    #[test]
    fn link_replaced_by_link_text() {
        assert_eq!(strip_markdown("[docs](https://example.com)"), "docs");
    }

    #[test]
    fn emphasis_layers_stripped() {
        assert_eq!(strip_markdown("***both***"), "both");
        assert_eq!(strip_markdown("**bold**"), "bold");
        assert_eq!(strip_markdown("*italic*"), "italic");
        assert_eq!(strip_markdown("___both___"), "both");
        assert_eq!(strip_markdown("__bold__"), "bold");
        assert_eq!(strip_markdown("_italic_"), "italic");
        assert_eq!(strip_markdown("~~gone~~"), "gone");
    }

    #[test]
    fn underscore_identifiers_survive() {
        assert_eq!(strip_markdown("call snake_case_name()"), "call snake_case_name()");
    }

    #[test]
    fn headings_and_blockquotes_stripped_per_line() {
        assert_eq!(strip_markdown("## Title\n> quoted\nplain"), "Title\nquoted\nplain");
    }

    #[test]
    fn horizontal_rule_lines_removed() {
        // The emptied line leaves a 4-newline run, which then collapses to 2
        assert_eq!(strip_markdown("above\n\n---\n\nbelow"), "above\n\nbelow");
    }

    #[test]
    fn blank_runs_collapse_to_two() {
        assert_eq!(strip_markdown("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn result_is_trimmed() {
        assert_eq!(strip_markdown("  hello  \n"), "hello");
    }

    #[test]
    fn unmatched_markers_stay_literal() {
        assert_eq!(strip_markdown("a ** b"), "a ** b");
        assert_eq!(strip_markdown("tick ` alone"), "tick ` alone");
    }

    #[test]
    fn idempotent_on_plain_text() {
        let samples = [
            "just a plain sentence",
            "two lines\nof plain text",
            "numbers 1 2 3 and punctuation!?",
            "snake_case_name stays",
        ];
        for s in samples {
            let once = strip_markdown(s);
            assert_eq!(strip_markdown(&once), once);
        }
    }

    #[test]
    fn mixed_document_flattens() {
        let input = "# Report\n\nThe **result** is `42`.\n\nSee [details](https://x).\n";
        assert_eq!(strip_markdown(input), "Report\n\nThe result is 42.\n\nSee details.");
    }
}
