//! Loading the authoritative metadata export.

use std::path::Path;

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::error::{ItemFailure, PipelineError, Result};
use crate::metadata::normalize::{parse_choices, strip_markup};
use crate::metadata::{FieldMetadata, FieldType};
use crate::table::read_tsv;

/// Columns a metadata export cannot be used without
pub const REQUIRED_COLUMNS: [&str; 2] = ["field_name", "field_type"];

/// One row of a REDCap data-dictionary export, as exported
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataRow {
    pub field_name: Option<String>,
    pub field_type: Option<String>,
    pub field_label: Option<String>,
    pub select_choices_or_calculations: Option<String>,
}

/// Normalized fields plus everything that had to be skipped
#[derive(Debug, Clone, Default)]
pub struct MetadataLoad {
    pub fields: Vec<FieldMetadata>,
    /// Rows dropped entirely
    pub failures: Vec<ItemFailure>,
    /// Individual choice entries dropped from otherwise usable fields
    pub skipped_choices: Vec<ItemFailure>,
}

/// Read and normalize a metadata export
///
/// A missing file or one without the required columns halts the run; a bad
/// row only drops that field.
pub fn load_metadata(path: &Path) -> Result<MetadataLoad> {
    let batch = read_tsv(path)?;
    let schema = batch.schema();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| schema.index_of(name).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::Metadata(format!(
            "{} lacks required column(s): {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let rows: Vec<MetadataRow> = serde_arrow::from_record_batch(&batch)?;
    let load = normalize_rows(rows);

    log::info!(
        "Normalized {} metadata fields from {} ({} skipped)",
        load.fields.len(),
        path.display(),
        load.failures.len()
    );

    Ok(load)
}

/// Normalize raw rows into field metadata, in export order
#[must_use]
pub fn normalize_rows(rows: Vec<MetadataRow>) -> MetadataLoad {
    let mut load = MetadataLoad::default();
    let mut seen = FxHashSet::default();

    for (index, row) in rows.into_iter().enumerate() {
        let Some(field_name) = row
            .field_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
        else {
            load.failures
                .push(ItemFailure::new(format!("row {}", index + 1), "no field_name"));
            continue;
        };

        if !seen.insert(field_name.clone()) {
            load.failures
                .push(ItemFailure::new(&field_name, "duplicate field_name"));
            continue;
        }

        match normalize_row(&field_name, &row, &mut load.skipped_choices) {
            Ok(field) => load.fields.push(field),
            Err(reason) => load.failures.push(ItemFailure::new(&field_name, reason)),
        }
    }

    load
}

fn normalize_row(
    field_name: &str,
    row: &MetadataRow,
    skipped_choices: &mut Vec<ItemFailure>,
) -> std::result::Result<FieldMetadata, String> {
    let field_type: FieldType = row
        .field_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "no field_type".to_string())?
        .parse()
        .unwrap_or_else(|never| match never {});

    let select_choices = if field_type.has_choices() {
        let raw = row.select_choices_or_calculations.as_deref().unwrap_or_default();
        let parsed = parse_choices(raw);
        skipped_choices.extend(
            parsed
                .skipped
                .into_iter()
                .map(|entry| ItemFailure::new(field_name, format!("no comma in '{entry}'"))),
        );
        if parsed.labels.is_empty() {
            return Err(format!("{field_type} field without any parsable choice"));
        }
        Some(parsed.labels)
    } else {
        None
    };

    Ok(FieldMetadata {
        field_name: field_name.to_string(),
        field_label: strip_markup(row.field_label.as_deref().unwrap_or_default())
            .trim()
            .to_string(),
        field_type,
        select_choices,
    })
}
