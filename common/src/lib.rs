use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod artifact;
pub mod pipeline;

pub use artifact::{load_pipeline, ArtifactFormat};
pub use pipeline::{ColumnTransformer, HandleUnknown, LogisticRegression, Pipeline};

/// A single table cell. The trained pipelines only ever see integer and
/// categorical (string) inputs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Str(String),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s.as_str()),
            Cell::Int(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Str(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Str(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Str(s)
    }
}

/// One-row tabular input, columns kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<(String, Cell)>,
}

impl Frame {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Appends a column, replacing the value if the name is already present.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Cell>) {
        let name = name.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, cell)) => *cell = value,
            None => self.columns.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cell)| cell)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("columns are missing: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("Found unknown categories ['{value}'] in column '{column}' during transform")]
    UnknownCategory { column: String, value: String },
    #[error("column '{column}' expects {expected} input, got {got}")]
    InvalidValue {
        column: String,
        expected: &'static str,
        got: String,
    },
    #[error("model produced a non-finite value")]
    NonFinite,
    #[error("inconsistent pipeline artifact: {0}")]
    Inconsistent(String),
}

/// Binary classifier over a one-row frame.
///
/// Implementations are shared read-only across request handlers.
pub trait Model: Send + Sync {
    /// Predicted class label for the row.
    fn predict(&self, frame: &Frame) -> Result<i64, PipelineError>;

    /// Class probabilities for the row, ordered like the model's class labels.
    fn predict_proba(&self, frame: &Frame) -> Result<Vec<f64>, PipelineError>;
}

#[test]
fn test_frame_keeps_insertion_order() {
    let frame = Frame::default()
        .with("b", 1i64)
        .with("a", "x")
        .with("b", 2i64);
    assert_eq!(frame.column_names().count(), 2);
    assert_eq!(frame.column_names().collect::<Vec<_>>(), vec!["b", "a"]);
    assert_eq!(frame.get("b"), Some(&Cell::Int(2)));
    assert_eq!(frame.get("a").and_then(Cell::as_str), Some("x"));
    assert!(frame.get("c").is_none());
}

#[test]
fn test_missing_columns_message() {
    let err = PipelineError::MissingColumns(vec!["Hx Radiothreapy".into(), "T".into()]);
    assert_eq!(err.to_string(), "columns are missing: Hx Radiothreapy, T");
}
