use thiserror::Error;

#[derive(Error, Debug)]
pub enum TkError {
    #[error("Too many operations: {count} > {max}")]
    TooManyOperations { count: usize, max: usize },
    #[error("Unknown operation type: {0}")]
    UnknownOperation(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Write operation requires diff or content")]
    MissingWritePayload { path: String },
    #[error("Path escapes workspace root: {0}")]
    PathOutsideRoot(String),
    #[error("Patch error: {0}")]
    Patch(String),
    #[error("Hash mismatch for {path}: expected {expected}, found {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TkError {
    /// Render as a result-slot error object: `{"error": "<message>"}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

pub type Result<T> = std::result::Result<T, TkError>;
