use super::{sha256_hex, LocalWorkspace};
use crate::collaborators::FileReader;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;
use tk_core::{estimate_text, ReadStrategy, Result};

/// `auto` returns the whole file up to this many estimated tokens.
const AUTO_FULL_TOKENS: usize = 2000;
const SUMMARY_HEAD_LINES: usize = 20;

static RE_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:fn|def|function|func|class|struct|enum|trait|interface|impl|type)\b",
    )
    .unwrap()
});

/// Structural lines (functions, types, impls) prefixed with their line number.
pub(crate) fn signatures(text: &str) -> String {
    text.lines()
        .enumerate()
        .filter(|(_, l)| RE_SIGNATURE.is_match(l))
        .map(|(i, l)| format!("{}: {}", i + 1, l.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize(text: &str) -> String {
    let total = text.lines().count();
    let head = text
        .lines()
        .take(SUMMARY_HEAD_LINES)
        .collect::<Vec<_>>()
        .join("\n");
    let mut out = format!("{total} lines, ~{} tokens\n{head}", estimate_text(text));
    if total > SUMMARY_HEAD_LINES {
        out.push_str("\n...");
    }
    let sigs = signatures(text);
    if !sigs.is_empty() {
        out.push_str("\n--- structure ---\n");
        out.push_str(&sigs);
    }
    out
}

/// 1-based inclusive line range, clamped to the file.
fn line_range(text: &str, start: Option<usize>, end: Option<usize>) -> String {
    let total = text.lines().count();
    let start = start.unwrap_or(1).max(1);
    let end = end.unwrap_or(total).min(total);
    if start > end {
        return String::new();
    }
    text.lines()
        .skip(start - 1)
        .take(end - start + 1)
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl FileReader for LocalWorkspace {
    async fn read(
        &self,
        path: &str,
        strategy: ReadStrategy,
        start_line: Option<usize>,
        end_line: Option<usize>,
    ) -> Result<Value> {
        let bytes = tokio::fs::read(self.resolve(path)?).await?;
        let text = String::from_utf8_lossy(&bytes);

        let effective = match strategy {
            ReadStrategy::Auto if start_line.is_some() || end_line.is_some() => ReadStrategy::Partial,
            ReadStrategy::Auto if estimate_text(&text) <= AUTO_FULL_TOKENS => ReadStrategy::Full,
            ReadStrategy::Auto => ReadStrategy::Summary,
            other => other,
        };
        let content = match effective {
            ReadStrategy::Partial => line_range(&text, start_line, end_line),
            ReadStrategy::Summary => summarize(&text),
            ReadStrategy::Ast => signatures(&text),
            _ => text.to_string(),
        };

        Ok(json!({
            "path": path,
            "strategy": effective.to_string(),
            "lines": text.lines().count(),
            "tokens": estimate_text(&content),
            "hash": sha256_hex(&bytes),
            "content": content,
        }))
    }
}
