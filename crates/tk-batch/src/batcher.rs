//! Interaction batcher: runs a mixed list of operations and returns one
//! deduplicated, minified envelope.

use crate::collaborators::Collaborators;
use crate::dedup;
use crate::diff::{hunk_count, DiffSynthesizer};
use crate::local::LocalWorkspace;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tk_compactor::MinificationEngine;
use tk_core::{
    AnalyzeOp, BatchConfig, ContentType, Minifier, Operation, ReadOp, Result, SearchOp, TkError,
    WriteOp,
};
use tracing::{debug, info, warn};

/// Consolidated batch result before minification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchEnvelope {
    #[serde(rename = "_batch")]
    pub batch: bool,
    #[serde(rename = "_ops")]
    pub ops: usize,
    pub reads: Vec<Value>,
    pub writes: Vec<Value>,
    pub searches: Vec<Value>,
    pub analyses: Vec<Value>,
    pub shared: BTreeMap<String, String>,
    /// Entries that could not be parsed into an operation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTelemetry {
    pub original: usize,
    pub minified: usize,
    pub saved_pct: f64,
}

/// What a batch caller receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub payload: String,
    pub format: String,
    pub tokens: TokenTelemetry,
    pub client_instruction: String,
}

/// Operations split by type, each group in submission order.
#[derive(Debug, Default)]
struct Partitioned {
    reads: Vec<ReadOp>,
    writes: Vec<WriteOp>,
    searches: Vec<SearchOp>,
    analyses: Vec<AnalyzeOp>,
    rejected: Vec<Value>,
}

fn partition(operations: &[Value]) -> Partitioned {
    let mut groups = Partitioned::default();
    for (index, raw) in operations.iter().enumerate() {
        match Operation::from_value(raw) {
            Ok(Operation::Read(op)) => groups.reads.push(op),
            Ok(Operation::Write(op)) => groups.writes.push(op),
            Ok(Operation::Search(op)) => groups.searches.push(op),
            Ok(Operation::Analyze(op)) => groups.analyses.push(op),
            Err(e) => {
                debug!(index, error = %e, "rejected batch entry");
                groups.rejected.push(json!({"index": index, "error": e.to_string()}));
            }
        }
    }
    groups
}

/// Per-operation error slot with one identifying field.
fn op_error(err: &TkError, key: &str, value: &str) -> Value {
    let mut slot = err.to_json();
    slot[key] = Value::String(value.to_string());
    slot
}

pub struct InteractionBatcher {
    config: BatchConfig,
    collaborators: Collaborators,
    synthesizer: DiffSynthesizer,
    minifier: Arc<dyn Minifier>,
}

impl InteractionBatcher {
    pub fn new(
        config: BatchConfig,
        collaborators: Collaborators,
        synthesizer: DiffSynthesizer,
        minifier: Arc<dyn Minifier>,
    ) -> Self {
        Self { config, collaborators, synthesizer, minifier }
    }

    /// Batcher over the local filesystem rooted at `root`, using the default
    /// minification engine.
    pub fn local(root: impl Into<PathBuf>, config: BatchConfig) -> Self {
        let root = root.into();
        Self::new(
            config,
            Collaborators::from_shared(Arc::new(LocalWorkspace::new(root.clone()))),
            DiffSynthesizer::new(root),
            Arc::new(MinificationEngine::new()),
        )
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run a batch and minify the envelope. Only an oversized batch fails;
    /// every other failure lands in its operation's result slot.
    pub async fn run_batch(&self, operations: &[Value]) -> Result<BatchResponse> {
        let envelope = self.build_envelope(operations).await?;
        let payload = serde_json::to_value(&envelope)?;
        let minified = self.minifier.minify(&payload, ContentType::Json);

        if minified.result_tokens > self.config.max_batch_tokens {
            warn!(
                tokens = minified.result_tokens,
                limit = self.config.max_batch_tokens,
                "batch payload exceeds token budget"
            );
        }
        info!(
            ops = envelope.ops,
            original = minified.original_tokens,
            minified = minified.result_tokens,
            saved_pct = minified.savings_pct,
            "batch complete"
        );

        Ok(BatchResponse {
            payload: minified.data,
            format: minified.format,
            tokens: TokenTelemetry {
                original: minified.original_tokens,
                minified: minified.result_tokens,
                saved_pct: minified.savings_pct,
            },
            client_instruction: minified.client_instruction,
        })
    }

    /// Like `run_batch`, rendered as JSON; a fatal error becomes `{"error": ...}`.
    pub async fn run_batch_json(&self, operations: &[Value]) -> Value {
        let rendered = match self.run_batch(operations).await {
            Ok(response) => serde_json::to_value(response).map_err(TkError::from),
            Err(e) => Err(e),
        };
        rendered.unwrap_or_else(|e| e.to_json())
    }

    /// Execute every operation and assemble the envelope without minifying.
    ///
    /// Reads run first and see the pre-write state; writes follow in order;
    /// searches and analyses then run concurrently with each other.
    pub async fn build_envelope(&self, operations: &[Value]) -> Result<BatchEnvelope> {
        if operations.len() > self.config.max_ops {
            return Err(TkError::TooManyOperations {
                count: operations.len(),
                max: self.config.max_ops,
            });
        }

        let groups = partition(operations);
        debug!(
            reads = groups.reads.len(),
            writes = groups.writes.len(),
            searches = groups.searches.len(),
            analyses = groups.analyses.len(),
            rejected = groups.rejected.len(),
            "partitioned batch"
        );

        let mut reads = Vec::with_capacity(groups.reads.len());
        for op in &groups.reads {
            reads.push(self.run_read(op).await);
        }
        let shared = dedup::deduplicate(&mut reads);

        let mut writes = Vec::with_capacity(groups.writes.len());
        for op in &groups.writes {
            writes.push(self.run_write(op).await);
        }

        let (searches, analyses) = tokio::join!(
            self.run_searches(&groups.searches),
            self.run_analyses(&groups.analyses)
        );

        Ok(BatchEnvelope {
            batch: true,
            ops: operations.len(),
            reads,
            writes,
            searches,
            analyses,
            shared,
            rejected: groups.rejected,
        })
    }

    async fn run_read(&self, op: &ReadOp) -> Value {
        self.collaborators
            .reader
            .read(&op.path, op.strategy, op.start_line, op.end_line)
            .await
            .unwrap_or_else(|e| op_error(&e, "path", &op.path))
    }

    /// An explicit diff wins over content. Content is turned into a patch
    /// against the current file; when that patch comes out empty (content
    /// already on disk) there is nothing to write and the slot reports a
    /// missing payload.
    async fn run_write(&self, op: &WriteOp) -> Value {
        let patch = match (op.patch(), op.content.as_deref()) {
            (Some(patch), _) => patch.to_string(),
            (None, Some(content)) => match self.synthesizer.synthesize(&op.path, content).await {
                Ok(patch) => {
                    debug!(path = %op.path, hunks = hunk_count(&patch), "synthesized patch");
                    patch
                }
                Err(e) => return op_error(&e, "path", &op.path),
            },
            (None, None) => String::new(),
        };
        if patch.is_empty() {
            let err = TkError::MissingWritePayload { path: op.path.clone() };
            return op_error(&err, "path", &op.path);
        }
        self.collaborators
            .writer
            .apply(&op.path, &patch, op.expected_hash.as_deref())
            .await
            .unwrap_or_else(|e| op_error(&e, "path", &op.path))
    }

    async fn run_searches(&self, ops: &[SearchOp]) -> Vec<Value> {
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            let max_results = op.max_results.unwrap_or(self.config.default_max_results);
            let result = self
                .collaborators
                .searcher
                .search(&op.query, &op.directory, op.file_pattern.as_deref(), max_results)
                .await
                .unwrap_or_else(|e| op_error(&e, "query", &op.query));
            results.push(result);
        }
        results
    }

    async fn run_analyses(&self, ops: &[AnalyzeOp]) -> Vec<Value> {
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            results.push(self.run_analyze(op).await);
        }
        results
    }

    async fn run_analyze(&self, op: &AnalyzeOp) -> Value {
        let analyzer = &self.collaborators.analyzer;
        let summary = match analyzer.summarize(&op.directory, self.config.summary_depth).await {
            Ok(summary) => summary,
            Err(e) => return op_error(&e, "directory", &op.directory),
        };
        let context = match op.focus.as_deref() {
            Some(focus) if !op.is_overview() => analyzer
                .extract_context(&op.directory, focus, self.config.context_max_tokens)
                .await
                .unwrap_or_else(|e| op_error(&e, "directory", &op.directory)),
            _ => json!({"summary": summary.summary_text, "key_files": summary.key_files}),
        };
        json!({"summary": summary.summary_text, "context": context})
    }
}
