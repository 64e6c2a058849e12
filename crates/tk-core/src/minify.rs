//! Contract for the minification collaborator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Content-type hint passed to a minifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Json,
    Code,
    Text,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Json => write!(f, "json"),
            ContentType::Code => write!(f, "code"),
            ContentType::Text => write!(f, "text"),
        }
    }
}

/// Compact payload plus token telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Minified {
    pub data: String,
    pub format: String,
    pub original_tokens: usize,
    pub result_tokens: usize,
    pub savings_pct: f64,
    pub client_instruction: String,
}

pub trait Minifier: Send + Sync {
    fn minify(&self, payload: &Value, content_type: ContentType) -> Minified;
}
