//! Unified diffs: synthesis from desired text, and application.
//!
//! Output matches the classic `--- a/<path>` / `+++ b/<path>` layout with
//! three lines of context and no line terminators on the header lines.

use crate::local::join_within;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tk_core::{Result, TkError};

const CONTEXT: usize = 3;
/// Above this many DP cells the changed middle is emitted as one replace.
const LCS_CELL_LIMIT: usize = 4_000_000;

static RE_HUNK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Equal,
    Replace,
    Delete,
    Insert,
}

#[derive(Debug, Clone, Copy)]
struct Opcode {
    tag: Tag,
    i1: usize,
    i2: usize,
    j1: usize,
    j2: usize,
}

impl Opcode {
    fn new(tag: Tag, i1: usize, i2: usize, j1: usize, j2: usize) -> Self {
        Self { tag, i1, i2, j1, j2 }
    }
}

/// Matched runs `(i, j, len)` ending with the `(a.len(), b.len(), 0)` sentinel.
fn matching_blocks(a: &[&str], b: &[&str]) -> Vec<(usize, usize, usize)> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];

    let mut pairs: Vec<(usize, usize)> = (0..prefix).map(|k| (k, k)).collect();
    pairs.extend(
        lcs_pairs(mid_a, mid_b)
            .into_iter()
            .map(|(i, j)| (i + prefix, j + prefix)),
    );
    let (a_tail, b_tail) = (a.len() - suffix, b.len() - suffix);
    pairs.extend((0..suffix).map(|k| (a_tail + k, b_tail + k)));

    let mut blocks: Vec<(usize, usize, usize)> = Vec::new();
    for (i, j) in pairs {
        match blocks.last_mut() {
            Some((bi, bj, len)) if *bi + *len == i && *bj + *len == j => *len += 1,
            _ => blocks.push((i, j, 1)),
        }
    }
    blocks.push((a.len(), b.len(), 0));
    blocks
}

/// Longest-common-subsequence index pairs, in order.
fn lcs_pairs(a: &[&str], b: &[&str]) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 || (n + 1).saturating_mul(m + 1) > LCS_CELL_LIMIT {
        return Vec::new();
    }
    let width = m + 1;
    let mut dp = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i * width + j] = if a[i] == b[j] {
                dp[(i + 1) * width + j + 1] + 1
            } else {
                dp[(i + 1) * width + j].max(dp[i * width + j + 1])
            };
        }
    }
    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if dp[(i + 1) * width + j] >= dp[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

fn opcodes(a: &[&str], b: &[&str]) -> Vec<Opcode> {
    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    for (ai, bj, size) in matching_blocks(a, b) {
        let tag = match (i < ai, j < bj) {
            (true, true) => Some(Tag::Replace),
            (true, false) => Some(Tag::Delete),
            (false, true) => Some(Tag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            ops.push(Opcode::new(tag, i, ai, j, bj));
        }
        i = ai + size;
        j = bj + size;
        if size > 0 {
            ops.push(Opcode::new(Tag::Equal, ai, i, bj, j));
        }
    }
    ops
}

/// Split opcodes into hunks carrying at most `n` lines of context each side.
fn grouped_opcodes(mut codes: Vec<Opcode>, n: usize) -> Vec<Vec<Opcode>> {
    if codes.is_empty() {
        codes.push(Opcode::new(Tag::Equal, 0, 1, 0, 1));
    }
    if let Some(first) = codes.first_mut() {
        if first.tag == Tag::Equal {
            first.i1 = first.i1.max(first.i2.saturating_sub(n));
            first.j1 = first.j1.max(first.j2.saturating_sub(n));
        }
    }
    if let Some(last) = codes.last_mut() {
        if last.tag == Tag::Equal {
            last.i2 = last.i2.min(last.i1 + n);
            last.j2 = last.j2.min(last.j1 + n);
        }
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();
    for mut op in codes {
        if op.tag == Tag::Equal && op.i2 - op.i1 > 2 * n {
            group.push(Opcode::new(
                Tag::Equal,
                op.i1,
                op.i2.min(op.i1 + n),
                op.j1,
                op.j2.min(op.j1 + n),
            ));
            groups.push(std::mem::take(&mut group));
            op.i1 = op.i1.max(op.i2.saturating_sub(n));
            op.j1 = op.j1.max(op.j2.saturating_sub(n));
        }
        group.push(op);
    }
    if !group.is_empty() && !(group.len() == 1 && group[0].tag == Tag::Equal) {
        groups.push(group);
    }
    groups
}

fn format_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    match length {
        0 => format!("{start},0"),
        1 => format!("{}", start + 1),
        _ => format!("{},{length}", start + 1),
    }
}

/// Marker following a patch line whose source line has no terminator.
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

fn push_line(out: &mut Vec<String>, prefix: char, line: &str) {
    match line.strip_suffix('\n') {
        Some(body) => out.push(format!("{prefix}{body}")),
        None => {
            out.push(format!("{prefix}{line}"));
            out.push(NO_NEWLINE_MARKER.to_string());
        }
    }
}

/// Unified diff between two texts.
///
/// Lines are compared with their terminators, so a change to the final
/// newline is a real change and shows up as a `\ No newline at end of file`
/// marker. Identical inputs produce an empty string (no headers, no hunks).
pub fn unified_diff(path: &str, old: &str, new: &str) -> String {
    let a: Vec<&str> = old.split_inclusive('\n').collect();
    let b: Vec<&str> = new.split_inclusive('\n').collect();
    let groups = grouped_opcodes(opcodes(&a, &b), CONTEXT);
    if groups.is_empty() {
        return String::new();
    }

    let mut out = vec![format!("--- a/{path}"), format!("+++ b/{path}")];
    for group in groups {
        let (first, last) = (group[0], group[group.len() - 1]);
        out.push(format!(
            "@@ -{} +{} @@",
            format_range(first.i1, last.i2),
            format_range(first.j1, last.j2)
        ));
        for op in group {
            if op.tag == Tag::Equal {
                a[op.i1..op.i2].iter().for_each(|l| push_line(&mut out, ' ', l));
                continue;
            }
            if matches!(op.tag, Tag::Replace | Tag::Delete) {
                a[op.i1..op.i2].iter().for_each(|l| push_line(&mut out, '-', l));
            }
            if matches!(op.tag, Tag::Replace | Tag::Insert) {
                b[op.j1..op.j2].iter().for_each(|l| push_line(&mut out, '+', l));
            }
        }
    }
    out.join("\n")
}

/// Number of `@@` hunks in a patch.
pub fn hunk_count(patch: &str) -> usize {
    patch.lines().filter(|l| RE_HUNK.is_match(l)).count()
}

/// Builds patches against the current on-disk state under a root directory.
#[derive(Debug, Clone)]
pub struct DiffSynthesizer {
    root: PathBuf,
}

impl DiffSynthesizer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Patch turning the current content of `path` into `desired`.
    /// A missing file diffs against empty content.
    pub async fn synthesize(&self, path: &str, desired: &str) -> Result<String> {
        let current = read_or_empty(&join_within(&self.root, path)?).await?;
        Ok(unified_diff(path, &current, desired))
    }
}

/// File content decoded lossily, or empty when the file does not exist.
pub(crate) async fn read_or_empty(path: &Path) -> Result<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Outcome of applying a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub content: String,
    pub hunks: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

fn parse_count(m: Option<regex::Match<'_>>) -> usize {
    m.and_then(|m| m.as_str().parse().ok()).unwrap_or(1)
}

/// Apply a single-file unified diff to `original`, verifying context lines.
///
/// Unchanged lines keep their own terminators. An added line ends in `\n`
/// unless it is followed by a `\ No newline at end of file` marker.
pub fn apply_unified_diff(original: &str, patch: &str) -> Result<Applied> {
    let source: Vec<&str> = original.split_inclusive('\n').collect();
    let mut content = String::with_capacity(original.len());
    let mut cursor = 0usize;
    let (mut hunks, mut added, mut removed) = (0, 0, 0);

    let mut lines = patch.split('\n').peekable();
    while let Some(line) = lines.next() {
        let Some(caps) = RE_HUNK.captures(line) else {
            continue;
        };
        let old_start: usize = caps[1].parse().map_err(|_| TkError::Patch(format!("bad hunk header: {line}")))?;
        let old_len = parse_count(caps.get(2));
        let new_len = parse_count(caps.get(4));
        let start = if old_len == 0 { old_start } else { old_start.saturating_sub(1) };
        if start < cursor || start > source.len() {
            return Err(TkError::Patch(format!("hunk out of range: {line}")));
        }
        source[cursor..start].iter().for_each(|s| content.push_str(s));
        let mut pos = start;
        let (mut old_seen, mut new_seen) = (0, 0);

        while old_seen < old_len || new_seen < new_len {
            let Some(body) = lines.next() else {
                return Err(TkError::Patch(format!("truncated hunk: {line}")));
            };
            let (marker, text) = match body.chars().next() {
                Some(c @ (' ' | '-' | '+')) => (c, &body[1..]),
                Some('\\') => continue,
                None => (' ', ""),
                Some(_) => return Err(TkError::Patch(format!("unexpected line in hunk: {body}"))),
            };
            let terminated = !matches!(lines.peek(), Some(next) if next.starts_with('\\'));
            if !terminated {
                lines.next();
            }
            if marker != '+' {
                let current = source.get(pos).copied();
                let Some(current) = current.filter(|s| s.strip_suffix('\n').unwrap_or(*s) == text) else {
                    return Err(TkError::Patch(format!(
                        "context mismatch at line {}: expected {text:?}",
                        pos + 1
                    )));
                };
                if marker == ' ' {
                    content.push_str(current);
                    new_seen += 1;
                } else {
                    removed += 1;
                }
                pos += 1;
                old_seen += 1;
            } else {
                content.push_str(text);
                if terminated {
                    content.push('\n');
                }
                new_seen += 1;
                added += 1;
            }
        }
        cursor = pos;
        hunks += 1;
    }
    source[cursor..].iter().for_each(|s| content.push_str(s));

    Ok(Applied { content, hunks, lines_added: added, lines_removed: removed })
}
