//! Type inference and dictionary construction.

use arrow::record_batch::RecordBatch;

use crate::config::ColumnConfig;
use crate::dictionary::{DataDictionary, DictionaryEntry};
use crate::metadata::{FieldMetadata, FieldType};
use crate::table::observe::all_numeric;
use crate::table::string_column;

/// The dictionary plus what happened to each field on the way
#[derive(Debug, Clone, Default)]
pub struct DictionaryBuild {
    pub dictionary: DataDictionary,
    /// Fields kept out by an omit pattern
    pub omitted: Vec<String>,
    /// Text fields stored as `numeric`
    pub promoted: Vec<String>,
}

impl DictionaryBuild {
    /// Log the outcome of the build
    pub fn log_summary(&self) {
        log::info!("Data dictionary contains {} entries", self.dictionary.len());

        let checkbox = self.dictionary.checkbox_fields();
        if !checkbox.is_empty() {
            log::info!("Checkboxes exploded into multiple columns: {}", checkbox.join(", "));
        }
        let exploding = self.dictionary.exploding_fields();
        if !exploding.is_empty() {
            log::info!("Non-checkbox exploding fields: {}", exploding.join(", "));
        }
        if !self.promoted.is_empty() {
            log::info!("Text fields promoted to numeric: {}", self.promoted.join(", "));
        }
        if !self.omitted.is_empty() {
            log::debug!("Omitted fields: {}", self.omitted.join(", "));
        }
    }
}

/// Build the dictionary from authoritative metadata and the combined table
///
/// Promotion is decided on the combined table so one cohort with few
/// answers cannot veto it. Checkbox options are named `{field}_{code}`.
#[must_use]
pub fn build_dictionary(
    fields: &[FieldMetadata],
    combined: &RecordBatch,
    config: &ColumnConfig,
) -> DictionaryBuild {
    let mut build = DictionaryBuild::default();

    for field in fields {
        let name = field.field_name.as_str();

        if config.is_omitted(name) {
            build.omitted.push(name.to_string());
            continue;
        }

        let mut field_type = field.field_type.clone();
        if field_type == FieldType::Text && holds_only_numbers(combined, name) {
            field_type = FieldType::Numeric;
            build.promoted.push(name.to_string());
        }

        let mut entry = DictionaryEntry {
            field_type,
            label: field.field_label.clone(),
            value_labels: field.select_choices.clone(),
            is_checkbox: None,
            exploding: None,
            exploded_fields: None,
        };

        if let Some(columns) = config.exploded_fields_for(name) {
            entry.exploding = Some(true);
            entry.exploded_fields = Some(columns.to_vec());
        } else if field.field_type == FieldType::Checkbox {
            entry.is_checkbox = Some(true);
            entry.exploded_fields = field.select_choices.as_ref().map(|choices| {
                choices
                    .keys()
                    .map(|code| checkbox_column(name, code))
                    .collect()
            });
        }

        build.dictionary.insert(name, entry);
    }

    build
}

/// Physical column of one checkbox option
#[must_use]
pub fn checkbox_column(field_name: &str, code: &str) -> String {
    format!("{field_name}_{code}")
}

fn holds_only_numbers(combined: &RecordBatch, column: &str) -> bool {
    string_column(combined, column).is_ok_and(all_numeric)
}
