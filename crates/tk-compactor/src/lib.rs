//! Tokenette compactor: the default minification engine.
//!
//! Passes:
//! 1. JSON cleanup (strip null and empty-string fields, compact encoding)
//! 2. Format cleanup (trailing whitespace, runs of blank lines) for text/code

pub mod engine;
pub mod format;
pub mod json;

pub use engine::MinificationEngine;
