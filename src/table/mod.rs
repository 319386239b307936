//! Arrow-backed tables: TSV I/O, observed-type inference and dictionary typing.

pub mod io;
pub mod observe;
pub mod typed;

use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};

pub use io::{read_delimited, read_tsv, to_tsv_string, write_tsv};
pub use observe::{ObservedType, observe_column};
pub use typed::apply_dictionary;

/// Whether a raw cell counts as missing
#[must_use]
pub fn is_missing(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Column names in schema order
#[must_use]
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}

/// Look up a column that must be a string column
pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PipelineError::Config(format!("column '{name}' is not a string column")))
}

/// Trimmed non-missing values of a string array
pub fn present_values(array: &StringArray) -> impl Iterator<Item = &str> {
    array
        .iter()
        .filter(|v| !is_missing(*v))
        .flatten()
        .map(str::trim)
}

/// Rebuild a batch with the same columns under new names
pub fn rename_columns(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .zip(names)
        .map(|(field, name)| field.as_ref().clone().with_name(name))
        .collect();
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        batch.columns().to_vec(),
    )?)
}

/// Append a column holding the same string on every row
pub fn with_constant_column(batch: &RecordBatch, name: &str, value: &str) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(name, arrow::datatypes::DataType::Utf8, true));

    let mut columns = batch.columns().to_vec();
    let constant: ArrayRef = Arc::new(StringArray::from(vec![value; batch.num_rows()]));
    columns.push(constant);

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Reorder (and select) columns by name
pub fn project_by_name(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch> {
    let indices = names
        .iter()
        .map(|name| {
            batch
                .schema()
                .index_of(name)
                .map_err(|_| PipelineError::MissingColumn(name.clone()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(batch.project(&indices)?)
}

/// Distinct values of a string column in order of first appearance
#[must_use]
pub fn distinct_in_order(array: &StringArray) -> Vec<String> {
    let mut seen = rustc_hash::FxHashSet::default();
    let mut ordered = Vec::new();
    for value in present_values(array) {
        if seen.insert(value) {
            ordered.push(value.to_string());
        }
    }
    ordered
}
