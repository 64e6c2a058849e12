use super::{sha256_hex, LocalWorkspace};
use crate::collaborators::PatchWriter;
use crate::diff::apply_unified_diff;
use async_trait::async_trait;
use serde_json::{json, Value};
use tk_core::{Result, TkError};
use tokio::fs;
use tracing::debug;

#[async_trait]
impl PatchWriter for LocalWorkspace {
    async fn apply(&self, path: &str, patch: &str, expected_hash: Option<&str>) -> Result<Value> {
        let target = self.resolve(path)?;
        let current = match fs::read(&target).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        if let Some(expected) = expected_hash {
            let actual = sha256_hex(&current);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(TkError::HashMismatch {
                    path: path.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let applied = apply_unified_diff(&String::from_utf8_lossy(&current), patch)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| TkError::InvalidOperation(format!("not a file path: {path}")))?;
        let tmp_path = target.with_file_name(format!(".{file_name}.tmp"));
        if let Err(e) = fs::write(&tmp_path, applied.content.as_bytes()).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        fs::rename(&tmp_path, &target).await?;
        debug!(path, hunks = applied.hunks, "patch applied");

        Ok(json!({
            "success": true,
            "path": path,
            "hunks": applied.hunks,
            "lines_added": applied.lines_added,
            "lines_removed": applied.lines_removed,
            "hash": sha256_hex(applied.content.as_bytes()),
        }))
    }
}
