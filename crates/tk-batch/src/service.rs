//! Batch execution wired to the metrics aggregator.

use crate::batcher::InteractionBatcher;
use serde_json::{json, Value};
use std::sync::Arc;
use tk_metrics::MetricsTracker;

pub const BATCH_TOOL: &str = "tokenette_batch_ops";
pub const METRICS_TOOL: &str = "tokenette_metrics";

/// Tokens saved as reported by a tool result.
///
/// Looks for an integer `tokens_saved`/`total_tokens_saved`, then
/// `tokens.saved`, then `tokens.original - tokens.minified`.
pub fn tokens_saved_from_result(result: &Value) -> i64 {
    for key in ["tokens_saved", "total_tokens_saved"] {
        if let Some(n) = result.get(key).and_then(Value::as_i64) {
            return n;
        }
    }
    let Some(tokens) = result.get("tokens") else {
        return 0;
    };
    if let Some(saved) = tokens.get("saved").and_then(Value::as_i64) {
        return saved;
    }
    match (
        tokens.get("original").and_then(Value::as_i64),
        tokens.get("minified").and_then(Value::as_i64),
    ) {
        (Some(original), Some(minified)) => (original - minified).max(0),
        _ => 0,
    }
}

pub struct BatchService {
    batcher: InteractionBatcher,
    metrics: Arc<MetricsTracker>,
}

impl BatchService {
    pub fn new(batcher: InteractionBatcher, metrics: Arc<MetricsTracker>) -> Self {
        Self { batcher, metrics }
    }

    pub fn batcher(&self) -> &InteractionBatcher {
        &self.batcher
    }

    pub fn metrics(&self) -> &Arc<MetricsTracker> {
        &self.metrics
    }

    /// Run a batch and record it as one `BATCH_TOOL` call.
    pub async fn run(&self, operations: &[Value]) -> Value {
        let result = self.batcher.run_batch_json(operations).await;
        let input = json!({ "operations": operations });
        self.metrics.record_tool_call(
            BATCH_TOOL,
            Some(&input),
            Some(&result),
            tokens_saved_from_result(&result),
            None,
        );
        result
    }

    /// Current session metrics; the report itself is recorded as a call.
    pub fn metrics_report(&self) -> Value {
        let session = serde_json::to_value(self.metrics.snapshot()).unwrap_or_default();
        let result = json!({ "session": session });
        self.metrics.record_tool_call(METRICS_TOOL, None, Some(&result), 0, None);
        result
    }
}
