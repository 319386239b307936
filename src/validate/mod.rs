//! Consistency validation of the combined table against the data dictionary.
//!
//! Every check runs and contributes findings to one report. Findings are
//! data; nothing here mutates the table or fails the run.

pub mod compatibility;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use rustc_hash::FxHashSet;

use crate::config::{DateFormatConfig, SURVEY_COLUMN};
use crate::dictionary::{DataDictionary, DictionaryEntry, Explosion};
use crate::error::Result;
use crate::metadata::FieldType;
use crate::table::observe::{normalize_code, observe_values};
use crate::table::{
    ObservedType, column_names, distinct_in_order, observe_column, present_values,
    string_column, write_tsv,
};

pub use compatibility::{ExpectedKind, TypeCompatibility, check_type_compatibility};

/// How a field whose column is absent is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MissingKind {
    /// Option column of a standard checkbox
    Checkbox,
    /// Curated column of a non-standard exploding field
    NonStandardExploding,
    /// The single column of an ordinary field
    Plain,
}

impl MissingKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkbox => "checkbox",
            Self::NonStandardExploding => "non-standard exploding",
            Self::Plain => "plain",
        }
    }
}

/// Report grouping of findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FindingCategory {
    TypeMatch,
    ValueRange,
    CheckboxShape,
    MissingColumns,
    CohortTypeDrift,
}

impl FindingCategory {
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::TypeMatch => "Declared vs. observed type",
            Self::ValueRange => "Values outside declared choices",
            Self::CheckboxShape => "Checkbox shape",
            Self::MissingColumns => "Dictionary fields missing from the combined table",
            Self::CohortTypeDrift => "Columns with inconsistent types across surveys",
        }
    }
}

/// One problem found by the validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    TypeMismatch {
        field: String,
        declared: FieldType,
        expected: ExpectedKind,
        observed: ObservedType,
    },
    ValueOutOfRange {
        field: String,
        values: BTreeSet<String>,
    },
    UnexpectedExplodedColumn {
        field: String,
        column: String,
    },
    NonBooleanExplodedColumn {
        field: String,
        column: String,
        observed: ObservedType,
    },
    MissingColumn {
        field: String,
        column: String,
        kind: MissingKind,
    },
    CohortTypeDrift {
        column: String,
        /// Survey label -> observed type, in first-seen order
        per_cohort: Vec<(String, ObservedType)>,
    },
}

impl Finding {
    #[must_use]
    pub const fn category(&self) -> FindingCategory {
        match self {
            Self::TypeMismatch { .. } => FindingCategory::TypeMatch,
            Self::ValueOutOfRange { .. } => FindingCategory::ValueRange,
            Self::UnexpectedExplodedColumn { .. } | Self::NonBooleanExplodedColumn { .. } => {
                FindingCategory::CheckboxShape
            }
            Self::MissingColumn { .. } => FindingCategory::MissingColumns,
            Self::CohortTypeDrift { .. } => FindingCategory::CohortTypeDrift,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch {
                field,
                declared,
                expected,
                observed,
            } => write!(
                f,
                "{field}: declared {declared} expects {expected}, observed {observed}"
            ),
            Self::ValueOutOfRange { field, values } => {
                write!(f, "{field}: undeclared values {}", values.iter().join(", "))
            }
            Self::UnexpectedExplodedColumn { field, column } => {
                write!(f, "{field}: unexpected exploded column {column}")
            }
            Self::NonBooleanExplodedColumn {
                field,
                column,
                observed,
            } => write!(f, "{field}: exploded column {column} is {observed}, not boolean"),
            Self::MissingColumn {
                field,
                column,
                kind,
            } => {
                if field == column {
                    write!(f, "{field} ({})", kind.as_str())
                } else {
                    write!(f, "{field}: {column} ({})", kind.as_str())
                }
            }
            Self::CohortTypeDrift { column, per_cohort } => write!(
                f,
                "{column}: {}",
                per_cohort
                    .iter()
                    .map(|(survey, observed)| format!("{survey}={observed}"))
                    .join(", ")
            ),
        }
    }
}

/// Aggregated result of every validation check
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
    /// Every combined-table column with its observed type
    pub column_types: Vec<(String, ObservedType)>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Findings grouped by category, in category order
    #[must_use]
    pub fn by_category(&self) -> BTreeMap<FindingCategory, Vec<&Finding>> {
        let mut grouped: BTreeMap<FindingCategory, Vec<&Finding>> = BTreeMap::new();
        for finding in &self.findings {
            grouped.entry(finding.category()).or_default().push(finding);
        }
        grouped
    }

    /// Column types as a two-column table (`column`, `observed_type`)
    pub fn column_types_batch(&self) -> Result<RecordBatch> {
        let schema = Schema::new(vec![
            Field::new("column", DataType::Utf8, false),
            Field::new("observed_type", DataType::Utf8, false),
        ]);
        let columns: ArrayRef = Arc::new(StringArray::from_iter_values(
            self.column_types.iter().map(|(name, _)| name.as_str()),
        ));
        let types: ArrayRef = Arc::new(StringArray::from_iter_values(
            self.column_types.iter().map(|(_, observed)| observed.as_str()),
        ));
        Ok(RecordBatch::try_new(Arc::new(schema), vec![columns, types])?)
    }

    /// Write the column types listing as TSV
    pub fn write_column_types(&self, path: &Path) -> Result<()> {
        write_tsv(&self.column_types_batch()?, path)
    }
}

/// Run every check of the combined (text) table against the dictionary
pub fn validate(
    combined: &RecordBatch,
    dictionary: &DataDictionary,
    dates: &DateFormatConfig,
) -> Result<ValidationReport> {
    let present: FxHashSet<String> = column_names(combined).into_iter().collect();
    let mut report = ValidationReport::default();

    for (name, entry) in dictionary.iter() {
        match entry.explosion() {
            Explosion::None => {
                if present.contains(name) {
                    check_plain_field(combined, name, entry, dates, &mut report.findings)?;
                } else {
                    report.findings.push(Finding::MissingColumn {
                        field: name.to_string(),
                        column: name.to_string(),
                        kind: MissingKind::Plain,
                    });
                }
            }
            Explosion::Checkbox(columns) => {
                check_checkbox_shape(combined, dictionary, name, columns, dates, &mut report.findings)?;
            }
            Explosion::NonStandard(columns) => {
                report.findings.extend(
                    columns
                        .iter()
                        .filter(|column| !present.contains(column.as_str()))
                        .map(|column| Finding::MissingColumn {
                            field: name.to_string(),
                            column: column.clone(),
                            kind: MissingKind::NonStandardExploding,
                        }),
                );
            }
        }
    }

    report.findings.extend(cohort_type_drift(combined, dates)?);

    report.column_types = combined
        .schema()
        .fields()
        .iter()
        .zip(combined.columns())
        .map(|(field, column)| (field.name().clone(), observe_column(column, dates)))
        .collect();

    log::info!(
        "Validation finished with {} finding(s) over {} dictionary fields",
        report.findings.len(),
        dictionary.len()
    );

    Ok(report)
}

fn check_plain_field(
    combined: &RecordBatch,
    name: &str,
    entry: &DictionaryEntry,
    dates: &DateFormatConfig,
    findings: &mut Vec<Finding>,
) -> Result<()> {
    let values = string_column(combined, name)?;
    let observed = observe_values(present_values(values), dates);
    let expected = ExpectedKind::for_field_type(&entry.field_type);

    if !check_type_compatibility(observed, expected).is_compatible() {
        findings.push(Finding::TypeMismatch {
            field: name.to_string(),
            declared: entry.field_type.clone(),
            expected,
            observed,
        });
    }

    if entry.field_type.is_single_choice() {
        let declared: FxHashSet<String> = entry
            .value_labels
            .iter()
            .flat_map(|labels| labels.keys())
            .map(normalize_code)
            .collect();
        let undeclared: BTreeSet<String> = present_values(values)
            .map(normalize_code)
            .filter(|code| !declared.contains(code))
            .collect();
        if !undeclared.is_empty() {
            findings.push(Finding::ValueOutOfRange {
                field: name.to_string(),
                values: undeclared,
            });
        }
    }

    Ok(())
}

fn check_checkbox_shape(
    combined: &RecordBatch,
    dictionary: &DataDictionary,
    name: &str,
    columns: &[String],
    dates: &DateFormatConfig,
    findings: &mut Vec<Finding>,
) -> Result<()> {
    let declared: FxHashSet<&str> = columns.iter().map(String::as_str).collect();

    for column in columns {
        if combined.column_by_name(column).is_none() {
            findings.push(Finding::MissingColumn {
                field: name.to_string(),
                column: column.clone(),
                kind: MissingKind::Checkbox,
            });
            continue;
        }
        let observed = observe_values(present_values(string_column(combined, column)?), dates);
        if !matches!(observed, ObservedType::Boolean | ObservedType::Empty) {
            findings.push(Finding::NonBooleanExplodedColumn {
                field: name.to_string(),
                column: column.clone(),
                observed,
            });
        }
    }

    let prefix = format!("{name}_");
    let roles = dictionary.column_roles();
    findings.extend(
        column_names(combined)
            .into_iter()
            .filter(|column| column.starts_with(&prefix))
            .filter(|column| !declared.contains(column.as_str()))
            .filter(|column| !roles.contains_key(column.as_str()))
            .map(|column| Finding::UnexpectedExplodedColumn {
                field: name.to_string(),
                column,
            }),
    );

    Ok(())
}

/// Columns whose observed types per survey do not all unify
pub fn cohort_type_drift(combined: &RecordBatch, dates: &DateFormatConfig) -> Result<Vec<Finding>> {
    let Some(surveys) = combined
        .column_by_name(SURVEY_COLUMN)
        .and_then(|column| column.as_any().downcast_ref::<StringArray>())
    else {
        log::warn!("No '{SURVEY_COLUMN}' column; skipping the cross-survey type check");
        return Ok(Vec::new());
    };
    let labels = distinct_in_order(surveys);
    let mut findings = Vec::new();

    for name in column_names(combined) {
        if name == SURVEY_COLUMN {
            continue;
        }
        let values = string_column(combined, &name)?;

        let per_cohort: Vec<(String, ObservedType)> = labels
            .iter()
            .map(|label| {
                let cohort_values = surveys
                    .iter()
                    .zip(values.iter())
                    .filter(|(survey, _)| survey.map(str::trim) == Some(label.as_str()))
                    .filter_map(|(_, value)| value)
                    .map(str::trim)
                    .filter(|value| !value.is_empty());
                (label.clone(), observe_values(cohort_values, dates))
            })
            .collect();

        let consistent = per_cohort
            .iter()
            .tuple_combinations()
            .all(|((_, a), (_, b))| a.unifies_with(*b));
        if !consistent {
            findings.push(Finding::CohortTypeDrift {
                column: name,
                per_cohort,
            });
        }
    }

    Ok(findings)
}
