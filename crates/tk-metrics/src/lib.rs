//! Tokenette metrics: thread-safe usage counters with optional JSON persistence.

pub mod snapshot;
pub mod store;
pub mod tracker;

pub use snapshot::{MetricsSnapshot, ModelMetrics, ToolMetrics};
pub use store::MetricsStore;
pub use tracker::MetricsTracker;
