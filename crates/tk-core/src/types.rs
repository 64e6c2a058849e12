use crate::error::{Result, TkError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

fn current_dir() -> String {
    ".".into()
}

/// How a read collaborator should render a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStrategy {
    #[default]
    Auto,
    Full,
    Partial,
    Summary,
    Ast,
}

impl fmt::Display for ReadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStrategy::Auto => write!(f, "auto"),
            ReadStrategy::Full => write!(f, "full"),
            ReadStrategy::Partial => write!(f, "partial"),
            ReadStrategy::Summary => write!(f, "summary"),
            ReadStrategy::Ast => write!(f, "ast"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadOp {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub strategy: ReadStrategy,
    #[serde(default)]
    pub start_line: Option<usize>,
    #[serde(default)]
    pub end_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOp {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub diff: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Hex SHA-256 the target file must currently hash to.
    #[serde(default)]
    pub expected_hash: Option<String>,
}

impl WriteOp {
    /// The explicit patch, if one was supplied. An empty diff counts as absent.
    pub fn patch(&self) -> Option<&str> {
        self.diff.as_deref().filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOp {
    #[serde(default)]
    pub query: String,
    #[serde(default = "current_dir")]
    pub directory: String,
    #[serde(default)]
    pub file_pattern: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeOp {
    #[serde(default = "current_dir")]
    pub directory: String,
    #[serde(default)]
    pub focus: Option<String>,
}

impl AnalyzeOp {
    /// True when no focused context extraction is requested.
    pub fn is_overview(&self) -> bool {
        match self.focus.as_deref() {
            None | Some("") | Some("overview") => true,
            Some(_) => false,
        }
    }
}

/// One entry of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Read(ReadOp),
    Write(WriteOp),
    Search(SearchOp),
    Analyze(AnalyzeOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Write,
    Search,
    Analyze,
}

impl OperationKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "search" => Some(Self::Search),
            "analyze" => Some(Self::Analyze),
            _ => None,
        }
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Read(_) => OperationKind::Read,
            Operation::Write(_) => OperationKind::Write,
            Operation::Search(_) => OperationKind::Search,
            Operation::Analyze(_) => OperationKind::Analyze,
        }
    }

    /// Parse a caller-supplied JSON operation.
    ///
    /// A missing or unrecognized `type` yields `UnknownOperation`; a known
    /// type whose fields do not fit yields `InvalidOperation`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let tag = match value.get("type") {
            Some(Value::String(tag)) => tag.as_str(),
            Some(other) => return Err(TkError::UnknownOperation(other.to_string())),
            None => return Err(TkError::UnknownOperation("<missing>".into())),
        };
        if OperationKind::from_tag(tag).is_none() {
            return Err(TkError::UnknownOperation(tag.to_string()));
        }
        serde_json::from_value(value.clone()).map_err(|e| TkError::InvalidOperation(e.to_string()))
    }
}
