//! Typing a combined table with the data dictionary.
//!
//! The combined table is persisted as text; consumers call
//! [`apply_dictionary`] to get numeric, boolean and date columns back.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanBuilder, Date32Builder, Float64Builder, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;

use crate::config::DateFormatConfig;
use crate::dictionary::{ColumnRole, DataDictionary};
use crate::error::{PipelineError, Result};
use crate::metadata::FieldType;
use crate::table::observe::{parse_date, parse_flag};

/// Arrow type a column of the given field type is converted to
#[must_use]
pub fn target_type(field_type: &FieldType) -> DataType {
    if field_type.is_numeric() {
        DataType::Float64
    } else if field_type.is_flag() {
        DataType::Boolean
    } else if matches!(field_type, FieldType::DateYmd) {
        DataType::Date32
    } else {
        DataType::Utf8
    }
}

/// Convert the columns of a text table to the types the dictionary declares
///
/// Checkbox option columns become `Boolean`. Columns the dictionary does not
/// describe, and parts of non-standard exploding fields, stay text. Cells
/// that do not parse as the target type become null.
pub fn apply_dictionary(
    batch: &RecordBatch,
    dictionary: &DataDictionary,
    dates: &DateFormatConfig,
) -> Result<RecordBatch> {
    let roles = dictionary.column_roles();
    let schema = batch.schema();

    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let target = match roles.get(field.name().as_str()) {
            Some(ColumnRole::Field { entry, .. }) => target_type(&entry.field_type),
            Some(ColumnRole::CheckboxOption { .. }) => DataType::Boolean,
            Some(ColumnRole::ExplodedPart { .. }) | None => DataType::Utf8,
        };
        let converted = convert_column(column, &target, dates)?;
        fields.push(Field::new(field.name(), target, true));
        columns.push(converted);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Convert a text column to `target`
pub fn convert_column(
    array: &ArrayRef,
    target: &DataType,
    dates: &DateFormatConfig,
) -> Result<ArrayRef> {
    if array.data_type() == target {
        return Ok(array.clone());
    }

    let strings = array
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| {
            PipelineError::Config(format!(
                "expected a text column, found {:?}",
                array.data_type()
            ))
        })?;

    match target {
        DataType::Float64 => Ok(convert_string_to_float64(strings)),
        DataType::Boolean => Ok(convert_string_to_boolean(strings)),
        DataType::Date32 => Ok(convert_string_to_date32(strings, dates)),
        other => Err(PipelineError::Config(format!(
            "no conversion from text to {other:?}"
        ))),
    }
}

fn convert_string_to_float64(strings: &StringArray) -> ArrayRef {
    let mut builder = Float64Builder::with_capacity(strings.len());
    for value in strings.iter() {
        let number = value
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite());
        builder.append_option(number);
    }
    Arc::new(builder.finish())
}

fn convert_string_to_boolean(strings: &StringArray) -> ArrayRef {
    let mut builder = BooleanBuilder::with_capacity(strings.len());
    for value in strings.iter() {
        builder.append_option(value.and_then(parse_flag));
    }
    Arc::new(builder.finish())
}

fn convert_string_to_date32(strings: &StringArray, dates: &DateFormatConfig) -> ArrayRef {
    let epoch = NaiveDate::default();
    let mut builder = Date32Builder::with_capacity(strings.len());
    for value in strings.iter() {
        let days = value
            .filter(|v| !v.trim().is_empty())
            .and_then(|v| parse_date(v, dates))
            .and_then(|date| i32::try_from(date.signed_duration_since(epoch).num_days()).ok());
        builder.append_option(days);
    }
    Arc::new(builder.finish())
}
