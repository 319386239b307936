//! A Rust library for harmonizing multilingual REDCap survey exports into one
//! combined table and a data dictionary, with consistency validation and a
//! descriptive domain report.

pub mod config;
pub mod dictionary;
pub mod error;
pub mod fetch;
pub mod harmonize;
pub mod metadata;
pub mod pipeline;
pub mod report;
pub mod table;
pub mod utils;
pub mod validate;

// Re-export the most common types for easier use
// Core types
pub use config::{CohortSpec, ColumnConfig, PipelineConfig};
pub use dictionary::{DataDictionary, DictionaryEntry, build_dictionary};
pub use error::{ItemFailure, PipelineError, Result};
pub use metadata::{FieldMetadata, FieldType};

// Arrow types
pub use arrow::record_batch::RecordBatch;

// Harmonization and validation
pub use harmonize::{ColumnMismatch, CombinedTable, harmonize};
pub use validate::{Finding, ValidationReport, validate};

// Stages
pub use pipeline::{build_artifacts, load_data, run_pull, run_report, run_validate};
pub use report::{AxisScale, ChartMode, ComparisonMode, ReportOptions};
