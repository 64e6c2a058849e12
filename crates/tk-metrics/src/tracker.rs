//! Process-wide usage counters.
//!
//! Every mutation happens under one lock so concurrent `record_*` calls never
//! lose updates. Persistence runs after the lock is released and its failures
//! are discarded in `persist`, the only place they can surface.

use crate::snapshot::{MetricsSnapshot, ModelMetrics, ToolMetrics};
use crate::store::MetricsStore;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tk_core::{estimate, MetricsConfig};
use tracing::{debug, warn};

pub struct MetricsTracker {
    state: Mutex<MetricsSnapshot>,
    store: Option<MetricsStore>,
    /// Serializes snapshot+write so the file never goes backwards.
    persist_lock: Mutex<()>,
}

impl MetricsTracker {
    /// Create a tracker. With persistence on, the last saved state is loaded;
    /// a missing or corrupt file starts from zero.
    pub fn new(config: &MetricsConfig) -> Self {
        let store = config
            .persist_metrics
            .then(|| MetricsStore::new(config.metrics_file.clone()));
        let state = store
            .as_ref()
            .and_then(MetricsStore::load)
            .unwrap_or_else(MetricsSnapshot::empty);
        Self {
            state: Mutex::new(state),
            store,
            persist_lock: Mutex::new(()),
        }
    }

    /// Tracker that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(MetricsSnapshot::empty()),
            store: None,
            persist_lock: Mutex::new(()),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub fn record_tool_call(
        &self,
        tool_name: &str,
        input: Option<&Value>,
        output: Option<&Value>,
        tokens_saved: i64,
        cache_hit: Option<bool>,
    ) {
        let input_tokens = estimate(&input) as u64;
        let output_tokens = estimate(&output) as u64;
        let saved = tokens_saved.max(0) as u64;

        {
            let mut state = self.state.lock();
            let tool = state.tools.entry(tool_name.to_string()).or_default();
            apply_call(tool, input_tokens, output_tokens, saved, cache_hit);
            apply_call(&mut state.totals, input_tokens, output_tokens, saved, cache_hit);
            state.last_updated = Utc::now();
        }
        debug!(tool = tool_name, input_tokens, output_tokens, tokens_saved = saved, "recorded tool call");
        self.persist();
    }

    /// Count a cache lookup that is not tied to a tool call.
    pub fn record_cache(&self, hit: bool, tokens_saved: i64) {
        {
            let mut state = self.state.lock();
            state.totals.record_cache(hit);
            state.totals.tokens_saved += tokens_saved.max(0) as u64;
            state.last_updated = Utc::now();
        }
        self.persist();
    }

    pub fn record_model_use(&self, model: &str, multiplier: f64) {
        {
            let mut state = self.state.lock();
            let entry: &mut ModelMetrics = state.models.entry(model.to_string()).or_default();
            entry.calls += 1;
            entry.multiplier_total += multiplier;
            state.last_updated = Utc::now();
        }
        self.persist();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock().clone()
    }

    /// Zero everything, restart the clock and persist the cleared state.
    pub fn reset(&self) {
        *self.state.lock() = MetricsSnapshot::empty();
        self.persist();
    }

    /// Write current state out; call on shutdown.
    pub fn flush(&self) {
        self.persist();
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let _guard = self.persist_lock.lock();
        let snapshot = self.snapshot();
        if let Err(e) = store.save(&snapshot) {
            warn!(path = %store.path().display(), error = %e, "metrics persistence failed");
        }
    }
}

fn apply_call(
    m: &mut ToolMetrics,
    input_tokens: u64,
    output_tokens: u64,
    tokens_saved: u64,
    cache_hit: Option<bool>,
) {
    m.calls += 1;
    m.input_tokens += input_tokens;
    m.output_tokens += output_tokens;
    m.tokens_saved += tokens_saved;
    if let Some(hit) = cache_hit {
        m.record_cache(hit);
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::in_memory()
    }
}
