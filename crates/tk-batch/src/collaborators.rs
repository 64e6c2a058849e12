//! Contracts for the file, search and workspace collaborators the
//! dispatcher drives. Results are structured JSON so they can be embedded
//! into the batch envelope unchanged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tk_core::{ReadStrategy, Result};

#[async_trait]
pub trait FileReader: Send + Sync {
    /// Read `path` with the given strategy. Textual results carry `content`.
    async fn read(
        &self,
        path: &str,
        strategy: ReadStrategy,
        start_line: Option<usize>,
        end_line: Option<usize>,
    ) -> Result<Value>;
}

#[async_trait]
pub trait PatchWriter: Send + Sync {
    /// Apply a unified diff to `path`, optionally guarded by the current hash.
    async fn apply(&self, path: &str, patch: &str, expected_hash: Option<&str>) -> Result<Value>;
}

#[async_trait]
pub trait CodeSearcher: Send + Sync {
    async fn search(
        &self,
        query: &str,
        directory: &str,
        file_pattern: Option<&str>,
        max_results: usize,
    ) -> Result<Value>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSummary {
    pub summary_text: String,
    pub key_files: Vec<String>,
}

#[async_trait]
pub trait WorkspaceAnalyzer: Send + Sync {
    async fn summarize(&self, directory: &str, max_depth: usize) -> Result<WorkspaceSummary>;

    /// Focus-driven context bounded by a token budget.
    async fn extract_context(&self, directory: &str, focus: &str, max_tokens: usize) -> Result<Value>;
}

/// The full set of collaborators a batch runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub reader: Arc<dyn FileReader>,
    pub writer: Arc<dyn PatchWriter>,
    pub searcher: Arc<dyn CodeSearcher>,
    pub analyzer: Arc<dyn WorkspaceAnalyzer>,
}

impl Collaborators {
    /// Use one object for every role.
    pub fn from_shared<T>(inner: Arc<T>) -> Self
    where
        T: FileReader + PatchWriter + CodeSearcher + WorkspaceAnalyzer + 'static,
    {
        Self {
            reader: inner.clone(),
            writer: inner.clone(),
            searcher: inner.clone(),
            analyzer: inner,
        }
    }
}
