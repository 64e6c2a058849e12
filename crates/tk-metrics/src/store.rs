//! Crash-safe JSON file holding the last metrics snapshot.

use crate::snapshot::MetricsSnapshot;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tk_core::Result;
use tracing::{debug, warn};

pub struct MetricsStore {
    path: PathBuf,
}

impl MetricsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot. Missing or unreadable files yield `None`.
    pub fn load(&self) -> Option<MetricsSnapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no persisted metrics");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt metrics file");
                None
            }
        }
    }

    /// Write the snapshot to a sibling temp file, then rename it over the target.
    pub fn save(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.path.with_extension("tmp");
        let result = (|| -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(&body)?;
            f.flush()?;
            f.sync_all()?;
            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}
