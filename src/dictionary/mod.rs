//! The data dictionary: one entry per logical survey field.
//!
//! Persisted as JSON and treated as the contract between the build stage and
//! every consumer (validation, typing, reporting).

pub mod builder;

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::util::{safe_read_to_string, write_atomically};
use crate::error::{PipelineError, Result};
use crate::metadata::FieldType;
use crate::utils::OrderedMap;

pub use builder::{DictionaryBuild, build_dictionary};

/// Dictionary entry for one logical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// Final type; `numeric` when a text field only ever holds numbers
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    /// Code -> label for choice fields, `null` otherwise
    pub value_labels: Option<OrderedMap<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_checkbox: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploding: Option<bool>,
    /// Physical columns this field is spread over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploded_fields: Option<Vec<String>>,
}

/// How a logical field maps onto physical columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Explosion<'a> {
    /// One column named like the field
    None,
    /// One boolean column per choice code
    Checkbox(&'a [String]),
    /// Hand-curated list of columns
    NonStandard(&'a [String]),
}

impl DictionaryEntry {
    #[must_use]
    pub fn is_checkbox(&self) -> bool {
        self.is_checkbox == Some(true)
    }

    #[must_use]
    pub fn is_exploding(&self) -> bool {
        self.exploding == Some(true)
    }

    #[must_use]
    pub fn explosion(&self) -> Explosion<'_> {
        match self.exploded_fields.as_deref() {
            Some(fields) if self.is_exploding() => Explosion::NonStandard(fields),
            Some(fields) if self.is_checkbox() => Explosion::Checkbox(fields),
            _ => Explosion::None,
        }
    }

    /// Label for a code, falling back to the code itself
    #[must_use]
    pub fn label_for<'a>(&'a self, code: &'a str) -> &'a str {
        self.value_labels
            .as_ref()
            .and_then(|labels| labels.get(code))
            .map_or(code, String::as_str)
    }
}

/// What a physical column of the combined table is, per the dictionary
#[derive(Debug, Clone, Copy)]
pub enum ColumnRole<'a> {
    /// The column of a non-exploding field
    Field {
        name: &'a str,
        entry: &'a DictionaryEntry,
    },
    /// One option of a checkbox field
    CheckboxOption {
        field: &'a str,
        entry: &'a DictionaryEntry,
        code: &'a str,
    },
    /// One column of a non-standard exploding field
    ExplodedPart {
        field: &'a str,
        entry: &'a DictionaryEntry,
    },
}

/// Field name -> entry, in metadata order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataDictionary {
    entries: OrderedMap<DictionaryEntry>,
}

impl DataDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field_name: impl Into<String>, entry: DictionaryEntry) {
        self.entries.insert(field_name, entry);
    }

    /// Entry for a field that must exist
    pub fn entry(&self, field_name: &str) -> Result<&DictionaryEntry> {
        self.entries
            .get(field_name)
            .ok_or_else(|| PipelineError::UnknownField(field_name.to_string()))
    }

    #[must_use]
    pub fn get(&self, field_name: &str) -> Option<&DictionaryEntry> {
        self.entries.get(field_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DictionaryEntry)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Physical columns of a field that must exist
    pub fn physical_columns(&self, field_name: &str) -> Result<Vec<String>> {
        let entry = self.entry(field_name)?;
        Ok(entry
            .exploded_fields
            .clone()
            .unwrap_or_else(|| vec![field_name.to_string()]))
    }

    /// Names of checkbox fields
    #[must_use]
    pub fn checkbox_fields(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, entry)| entry.is_checkbox())
            .map(|(name, _)| name)
            .collect()
    }

    /// Names of non-standard exploding fields
    #[must_use]
    pub fn exploding_fields(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, entry)| entry.is_exploding())
            .map(|(name, _)| name)
            .collect()
    }

    /// Every physical column the dictionary accounts for, with its role
    ///
    /// When two fields claim the same column the first one in dictionary
    /// order wins.
    #[must_use]
    pub fn column_roles(&self) -> FxHashMap<&str, ColumnRole<'_>> {
        let mut roles = FxHashMap::default();

        for (name, entry) in self.iter() {
            match entry.explosion() {
                Explosion::None => {
                    roles.entry(name).or_insert(ColumnRole::Field { name, entry });
                }
                Explosion::Checkbox(columns) => {
                    for column in columns {
                        let code = column
                            .strip_prefix(name)
                            .and_then(|rest| rest.strip_prefix('_'))
                            .unwrap_or(column.as_str());
                        roles.entry(column.as_str()).or_insert(ColumnRole::CheckboxOption {
                            field: name,
                            entry,
                            code,
                        });
                    }
                }
                Explosion::NonStandard(columns) => {
                    for column in columns {
                        roles
                            .entry(column.as_str())
                            .or_insert(ColumnRole::ExplodedPart { field: name, entry });
                    }
                }
            }
        }

        roles
    }

    /// Read a persisted dictionary
    pub fn load(path: &Path) -> Result<Self> {
        let content = safe_read_to_string(path, "data dictionary")?;
        let dictionary: Self = serde_json::from_str(&content)?;
        log::info!(
            "Loaded data dictionary with {} entries from {}",
            dictionary.len(),
            path.display()
        );
        Ok(dictionary)
    }

    /// Pretty-printed JSON, two-space indent, trailing newline
    pub fn to_json_string(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Persist the dictionary atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;
        write_atomically(path, |writer| {
            std::io::Write::write_all(writer, json.as_bytes())
                .map_err(|e| PipelineError::io("failed to write data dictionary", path, e))
        })
    }
}
