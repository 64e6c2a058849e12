use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenetteConfig {
    pub batch: BatchConfig,
    pub metrics: MetricsConfig,
}

/// Limits and collaborator bounds for the batch dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_ops: usize,
    /// Advisory only: oversized payloads are logged, not rejected.
    pub max_batch_tokens: usize,
    pub summary_depth: usize,
    pub context_max_tokens: usize,
    pub default_max_results: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_ops: 25,
            max_batch_tokens: 60_000,
            summary_depth: 3,
            context_max_tokens: 4000,
            default_max_results: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub persist_metrics: bool,
    pub metrics_file: PathBuf,
}

impl MetricsConfig {
    /// Persisting config writing to `path`.
    pub fn persisted(path: impl Into<PathBuf>) -> Self {
        Self {
            persist_metrics: true,
            metrics_file: path.into(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let base = dirs::home_dir().unwrap_or_default();
        Self {
            persist_metrics: false,
            metrics_file: base.join(".tokenette").join("metrics.json"),
        }
    }
}
