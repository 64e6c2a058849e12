//! Format cleanup: whitespace optimization for text and code payloads.

use regex::Regex;
use std::sync::LazyLock;

static RE_MULTI_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static RE_MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([^ \n]) {2,}").unwrap());

/// Strip trailing whitespace per line, collapse 3+ newlines to 2 and drop
/// leading/trailing blank lines.
pub fn strip_redundant_whitespace(text: &str) -> String {
    let result = RE_MULTI_NEWLINE.replace_all(text, "\n\n");
    result
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

/// Collapse interior runs of spaces. Leading indentation is preserved.
pub fn collapse_spaces(text: &str) -> String {
    RE_MULTI_SPACE.replace_all(text, "$1 ").to_string()
}

/// Cleanup for prose: whitespace plus interior space runs.
pub fn compress_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    collapse_spaces(&strip_redundant_whitespace(text))
}

/// Cleanup for source code: indentation is significant, so only
/// line-level whitespace is touched.
pub fn compress_code(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    strip_redundant_whitespace(text)
}
