//! Local-filesystem implementation of every batch collaborator, rooted at a
//! workspace directory. Paths in operations are resolved against the root.

mod analyze;
mod read;
mod search;
mod write;

use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tk_core::{Result, TkError};
use tokio::fs;

/// Directories never descended into.
const SKIP_DIRS: &[&str] = &[
    "target", "node_modules", "__pycache__", "dist", "build", "venv",
];

/// Files larger than this are not scanned by search or context extraction.
const MAX_SCAN_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        join_within(&self.root, path)
    }

    /// Root-relative display path with `/` separators.
    fn display_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Regular files under `directory`, depth-limited, sorted by path.
    async fn files_under(&self, directory: &str, max_depth: usize) -> anyhow::Result<Vec<PathBuf>> {
        let base = self.resolve(directory)?;
        let mut out = Vec::new();
        if fs::metadata(&base).await?.is_file() {
            out.push(base);
            return Ok(out);
        }
        walk(&base, 0, max_depth, &mut out).await?;
        out.sort();
        Ok(out)
    }
}

/// Join a caller-supplied relative path onto `root`. Absolute paths and
/// `..` components are rejected so nothing outside `root` is reachable.
pub(crate) fn join_within(root: &Path, path: &str) -> Result<PathBuf> {
    let rel = Path::new(path);
    let escapes = rel
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(TkError::PathOutsideRoot(path.to_string()));
    }
    Ok(root.join(rel))
}

fn is_skipped(name: &str) -> bool {
    name.starts_with('.') || SKIP_DIRS.contains(&name)
}

#[async_recursion::async_recursion]
async fn walk(current: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let mut rd = fs::read_dir(current).await?;
    while let Some(entry) = rd.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if is_skipped(&name) {
            continue;
        }
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            if depth + 1 < max_depth {
                walk(&entry.path(), depth + 1, max_depth, out).await?;
            }
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}

/// Read a file for scanning; `None` for oversized or unreadable files.
async fn read_scannable(path: &Path) -> Option<String> {
    let meta = fs::metadata(path).await.ok()?;
    if meta.len() > MAX_SCAN_BYTES {
        return None;
    }
    let bytes = fs::read(path).await.ok()?;
    String::from_utf8(bytes).ok()
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Lowercased, non-empty whitespace-separated terms.
fn terms_of(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}
