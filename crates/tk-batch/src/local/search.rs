use super::{read_scannable, terms_of, LocalWorkspace};
use crate::collaborators::CodeSearcher;
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use tk_core::{Result, TkError};

const MAX_LINE_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
struct Hit {
    path: String,
    line: usize,
    text: String,
    score: f64,
}

/// Translate a glob (`*`, `**`, `?`) into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                re.push_str(".*");
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| TkError::InvalidOperation(format!("bad file_pattern {pattern:?}: {e}")))
}

/// Patterns with a `/` match the whole relative path, others the file name.
fn pattern_matches(re: &Regex, has_slash: bool, rel_path: &str) -> bool {
    if has_slash {
        re.is_match(rel_path)
    } else {
        re.is_match(rel_path.rsplit('/').next().unwrap_or(rel_path))
    }
}

fn clip(line: &str) -> String {
    let trimmed = line.trim();
    match trimmed.char_indices().nth(MAX_LINE_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[async_trait]
impl CodeSearcher for LocalWorkspace {
    async fn search(
        &self,
        query: &str,
        directory: &str,
        file_pattern: Option<&str>,
        max_results: usize,
    ) -> Result<Value> {
        let terms = terms_of(query);
        if terms.is_empty() {
            return Ok(json!({"query": query, "results": [], "total": 0}));
        }
        let filter = file_pattern
            .filter(|p| !p.is_empty())
            .map(|p| glob_to_regex(p).map(|re| (re, p.contains('/'))))
            .transpose()?;

        let mut hits = Vec::new();
        for file in self.files_under(directory, usize::MAX).await? {
            let rel = self.display_path(&file);
            if let Some((re, has_slash)) = &filter {
                if !pattern_matches(re, *has_slash, &rel) {
                    continue;
                }
            }
            let Some(text) = read_scannable(&file).await else {
                continue;
            };
            for (idx, line) in text.lines().enumerate() {
                let lower = line.to_lowercase();
                let matched = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                if matched > 0 {
                    hits.push(Hit {
                        path: rel.clone(),
                        line: idx + 1,
                        text: clip(line),
                        score: matched as f64 / terms.len() as f64,
                    });
                }
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| a.line.cmp(&b.line))
        });
        let total = hits.len();
        hits.truncate(max_results);

        Ok(json!({"query": query, "results": hits, "total": total}))
    }
}
