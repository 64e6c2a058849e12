use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters kept per tool, and once more for the global totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolMetrics {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tokens_saved: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl ToolMetrics {
    /// Fraction of cache lookups that hit, 0.0 when there were none.
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / lookups as f64
    }

    pub(crate) fn record_cache(&mut self, hit: bool) {
        if hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMetrics {
    pub calls: u64,
    /// Sum of per-call cost multipliers.
    pub multiplier_total: f64,
}

/// Immutable point-in-time view of the tracker; also the persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default = "Utc::now")]
    pub started_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub totals: ToolMetrics,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolMetrics>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelMetrics>,
}

impl MetricsSnapshot {
    /// Zeroed state starting now.
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            last_updated: now,
            totals: ToolMetrics::default(),
            tools: BTreeMap::new(),
            models: BTreeMap::new(),
        }
    }
}
