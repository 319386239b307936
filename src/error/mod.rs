//! Error handling for the survey pipeline.

pub mod util;

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;

use crate::harmonize::ColumnMismatch;

/// Specialized error type for the pipeline stages
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Error opening, reading or writing a file
    #[error("IO error: {message} ({})", .path.display())]
    Io {
        message: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Error processing tabular data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error mapping table rows onto structs
    #[error("Row deserialization error: {0}")]
    Rows(#[from] serde_arrow::Error),

    /// Error reading or writing JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metadata export that cannot be used at all
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Cohort tables that do not share one column set
    #[error("Column sets differ across cohorts:\n{0}")]
    ColumnMismatch(ColumnMismatch),

    /// A table ended up with the same column name more than once
    #[error("Duplicate columns in cohort '{cohort}': {}", .columns.join(", "))]
    DuplicateColumns { cohort: String, columns: Vec<String> },

    /// A consumer referenced a field the data dictionary does not define
    #[error("Field '{0}' is not in the data dictionary")]
    UnknownField(String),

    /// A column expected in a table is absent
    #[error("Column '{0}' not found in table")]
    MissingColumn(String),

    /// An artifact that should have been written is missing or empty
    #[error("Artifact missing or empty: {}", .0.display())]
    MissingArtifact(PathBuf),
}

impl PipelineError {
    /// Wrap an IO error together with the path it happened on
    pub fn io(message: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            path: path.into(),
            source,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// A single item that could not be processed; the run continues without it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Name of the skipped item (field name, cohort key, choice entry)
    pub item: String,
    /// Why it was skipped
    pub reason: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.item, self.reason)
    }
}
