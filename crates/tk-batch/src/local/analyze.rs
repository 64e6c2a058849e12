use super::{read_scannable, terms_of, LocalWorkspace};
use crate::collaborators::{WorkspaceAnalyzer, WorkspaceSummary};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tk_core::{estimate_text, Result};

const KEY_FILES: &[&str] = &[
    "Cargo.toml", "package.json", "pyproject.toml", "setup.py", "go.mod",
    "README.md", "README", "Makefile", "Dockerfile",
    "main.rs", "lib.rs", "main.py", "__main__.py", "index.js", "index.ts", "main.go",
];
const SNIPPET_RADIUS: usize = 2;
const SNIPPET_MAX_LINES: usize = 40;
/// Lines shown for a file that matched only by path.
const SNIPPET_HEAD_LINES: usize = 10;
/// A term found in the file path outweighs a few body hits.
const PATH_HIT_WEIGHT: usize = 3;

#[derive(Debug, Serialize)]
struct ContextFile {
    path: String,
    score: usize,
    snippet: String,
    tokens: usize,
}

/// Numbered lines around each hit, merged, capped at `SNIPPET_MAX_LINES`.
/// Without body hits the head of the file is used.
fn snippet(text: &str, terms: &[String]) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut keep = vec![false; lines.len()];
    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if terms.iter().any(|t| lower.contains(t.as_str())) {
            let lo = i.saturating_sub(SNIPPET_RADIUS);
            let hi = (i + SNIPPET_RADIUS).min(lines.len() - 1);
            keep[lo..=hi].iter_mut().for_each(|k| *k = true);
        }
    }
    if !keep.contains(&true) {
        keep.iter_mut().take(SNIPPET_HEAD_LINES).for_each(|k| *k = true);
    }
    lines
        .iter()
        .enumerate()
        .filter(|(i, _)| keep[*i])
        .take(SNIPPET_MAX_LINES)
        .map(|(i, l)| format!("{}: {l}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn score(rel_path: &str, text: &str, terms: &[String]) -> usize {
    let lower_path = rel_path.to_lowercase();
    let lower = text.to_lowercase();
    terms
        .iter()
        .map(|t| {
            let body = lower.matches(t.as_str()).count();
            let path = if lower_path.contains(t.as_str()) { PATH_HIT_WEIGHT } else { 0 };
            body + path
        })
        .sum()
}

#[async_trait]
impl WorkspaceAnalyzer for LocalWorkspace {
    async fn summarize(&self, directory: &str, max_depth: usize) -> Result<WorkspaceSummary> {
        let files = self.files_under(directory, max_depth).await?;
        let mut by_ext: BTreeMap<String, usize> = BTreeMap::new();
        let mut key_files = Vec::new();
        for file in &files {
            let ext = file
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_else(|| "(none)".into());
            *by_ext.entry(ext).or_insert(0) += 1;
            let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            if KEY_FILES.contains(&name.as_ref()) {
                key_files.push(self.display_path(file));
            }
        }

        let mut langs: Vec<(String, usize)> = by_ext.into_iter().collect();
        langs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let langs = langs
            .iter()
            .map(|(ext, n)| format!("{ext} ({n})"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut summary_text = format!("{directory}: {} files", files.len());
        if !langs.is_empty() {
            summary_text.push_str(&format!("; types: {langs}"));
        }
        if !key_files.is_empty() {
            summary_text.push_str(&format!("; key files: {}", key_files.join(", ")));
        }

        Ok(WorkspaceSummary { summary_text, key_files })
    }

    async fn extract_context(&self, directory: &str, focus: &str, max_tokens: usize) -> Result<Value> {
        let terms = terms_of(focus);
        let mut ranked = Vec::new();
        for file in self.files_under(directory, usize::MAX).await? {
            let rel = self.display_path(&file);
            let Some(text) = read_scannable(&file).await else {
                continue;
            };
            let s = score(&rel, &text, &terms);
            if s > 0 {
                ranked.push((s, rel, text));
            }
        }
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let mut files = Vec::new();
        let mut tokens_used = 0;
        let mut truncated = false;
        for (s, path, text) in ranked {
            let snip = snippet(&text, &terms);
            if snip.is_empty() {
                continue;
            }
            let tokens = estimate_text(&snip);
            if tokens_used + tokens > max_tokens {
                truncated = true;
                break;
            }
            tokens_used += tokens;
            files.push(ContextFile { path, score: s, snippet: snip, tokens });
        }

        Ok(json!({
            "focus": focus,
            "files": files,
            "tokens_used": tokens_used,
            "truncated": truncated,
        }))
    }
}
