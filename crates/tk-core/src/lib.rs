//! Tokenette core: shared operation types, configuration, errors and token estimation.

pub mod config;
pub mod error;
pub mod minify;
pub mod tokens;
pub mod types;

pub use config::{BatchConfig, MetricsConfig, TokenetteConfig};
pub use error::{Result, TkError};
pub use minify::{ContentType, Minified, Minifier};
pub use tokens::{estimate, estimate_text};
pub use types::{AnalyzeOp, Operation, OperationKind, ReadOp, ReadStrategy, SearchOp, WriteOp};
