//! Tokenette batching engine.
//!
//! Accepts a mixed list of read/write/search/analyze operations, executes
//! them against pluggable collaborators, factors shared import lines out of
//! read results, synthesizes patches from raw content, and returns a single
//! minified envelope.

pub mod batcher;
pub mod collaborators;
pub mod dedup;
pub mod diff;
pub mod local;
pub mod service;

pub use batcher::{BatchEnvelope, BatchResponse, InteractionBatcher, TokenTelemetry};
pub use collaborators::{
    Collaborators, CodeSearcher, FileReader, PatchWriter, WorkspaceAnalyzer, WorkspaceSummary,
};
pub use dedup::{deduplicate, SHARED_IMPORTS_KEY, SHARED_IMPORTS_MARKER};
pub use diff::{apply_unified_diff, unified_diff, Applied, DiffSynthesizer};
pub use local::LocalWorkspace;
pub use service::{tokens_saved_from_result, BatchService, BATCH_TOOL, METRICS_TOOL};
