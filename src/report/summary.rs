//! Per-item distribution summaries over the typed combined table.

use std::collections::BTreeMap;

use arrow::array::{Array, BooleanArray, Date32Array, Float64Array, StringArray};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, TimeDelta};
use itertools::Itertools;

use crate::config::SURVEY_COLUMN;
use crate::dictionary::{DataDictionary, DictionaryEntry, Explosion};
use crate::error::{PipelineError, Result};
use crate::report::compare::ColumnComparison;
use crate::report::domain_map::DomainItem;
use crate::table::distinct_in_order;
use crate::table::observe::normalize_code;

/// Number of equal-width bins for numeric histograms
pub const HISTOGRAM_BINS: usize = 10;

/// Rows a summary is computed over
#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    pub rows: Vec<usize>,
}

/// The all-cohorts scope followed by one scope per survey label
pub fn scopes(batch: &RecordBatch) -> Result<Vec<Scope>> {
    let mut scopes = vec![Scope {
        name: "All Cohorts".to_string(),
        rows: (0..batch.num_rows()).collect(),
    }];

    let surveys = batch
        .column_by_name(SURVEY_COLUMN)
        .ok_or_else(|| PipelineError::MissingColumn(SURVEY_COLUMN.to_string()))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PipelineError::Config(format!("'{SURVEY_COLUMN}' is not a text column")))?;

    for label in distinct_in_order(surveys) {
        let rows = (0..surveys.len())
            .filter(|&row| surveys.is_valid(row) && surveys.value(row).trim() == label)
            .collect();
        scopes.push(Scope { name: label, rows });
    }
    Ok(scopes)
}

/// Summary statistics of a numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; undefined below two values
    pub std: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Quantile of sorted values by linear interpolation
#[must_use]
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Describe a set of values; `None` when there are none
#[must_use]
pub fn describe(values: &[f64]) -> Option<Description> {
    if values.is_empty() {
        return None;
    }
    let sorted: Vec<f64> = values.iter().copied().sorted_by(f64::total_cmp).collect();
    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let squares: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (squares / (count - 1) as f64).sqrt()
    });

    Some(Description {
        count,
        mean,
        std,
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[count - 1],
    })
}

/// Equal-width histogram, labelled by bin range
#[must_use]
pub fn histogram(values: &[f64], bins: usize) -> Vec<(String, usize)> {
    let Some(description) = describe(values) else {
        return Vec::new();
    };
    let (min, max) = (description.min, description.max);
    if bins == 0 || max <= min {
        return vec![(format_number(min), values.len())];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for value in values {
        let bin = (((value - min) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let start = min + width * i as f64;
            (format!("{}-{}", format_number(start), format_number(start + width)), count)
        })
        .collect()
}

/// Compact number formatting for labels and tables
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}

/// Distribution of one column within a scope
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    /// Label -> count, in display order
    Counts(Vec<(String, usize)>),
    Numeric {
        description: Description,
        histogram: Vec<(String, usize)>,
    },
    /// No non-missing values in scope
    Empty,
}

impl Distribution {
    /// Largest bar this distribution would draw
    #[must_use]
    pub fn max_count(&self) -> usize {
        match self {
            Self::Counts(bars) | Self::Numeric { histogram: bars, .. } => {
                bars.iter().map(|(_, count)| *count).max().unwrap_or(0)
            }
            Self::Empty => 0,
        }
    }
}

/// What is shown for one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDetails {
    pub column: String,
    pub label: String,
    pub field_type: String,
    pub value_labels: Vec<(String, String)>,
}

/// Summaries of one domain item, per scope
#[derive(Debug, Clone)]
pub struct ItemSummary {
    pub domain: String,
    pub item: String,
    pub columns: Vec<ColumnDetails>,
    /// Scope name -> one distribution per entry of `columns`
    pub scopes: Vec<(String, Vec<Distribution>)>,
    /// Tests between survey pairs, per physical column; empty when not requested
    pub comparisons: Vec<ColumnComparison>,
}

/// Summarize one item over every scope
pub fn summarize_item(
    typed: &RecordBatch,
    dictionary: &DataDictionary,
    item: &DomainItem,
    scopes: &[Scope],
) -> Result<ItemSummary> {
    let mut columns = Vec::new();
    let mut summarizers: Vec<Box<dyn Fn(&[usize]) -> Distribution + '_>> = Vec::new();

    for field in &item.fields {
        let entry = dictionary.entry(field)?;
        match entry.explosion() {
            Explosion::Checkbox(options) => {
                columns.push(ColumnDetails {
                    column: field.clone(),
                    label: entry.label.clone(),
                    field_type: entry.field_type.to_string(),
                    value_labels: value_labels(entry),
                });
                let present: Vec<(String, &BooleanArray)> = options
                    .iter()
                    .filter_map(|column| {
                        let array = typed.column_by_name(column)?.as_any().downcast_ref::<BooleanArray>()?;
                        let code = column
                            .strip_prefix(field.as_str())
                            .and_then(|rest| rest.strip_prefix('_'))
                            .unwrap_or(column);
                        Some((entry.label_for(code).to_string(), array))
                    })
                    .collect();
                summarizers.push(Box::new(move |rows: &[usize]| checkbox_counts(&present, rows)));
            }
            Explosion::NonStandard(parts) => {
                for column in parts {
                    let Some(array) = typed.column_by_name(column) else {
                        log::debug!("Exploded column {column} of {field} not in table");
                        continue;
                    };
                    columns.push(ColumnDetails {
                        column: column.clone(),
                        label: format!("{} ({column})", entry.label),
                        field_type: entry.field_type.to_string(),
                        value_labels: Vec::new(),
                    });
                    let array = array.clone();
                    summarizers.push(Box::new(move |rows: &[usize]| {
                        column_distribution(array.as_ref(), None, rows)
                    }));
                }
            }
            Explosion::None => {
                let array = typed
                    .column_by_name(field)
                    .ok_or_else(|| PipelineError::MissingColumn(field.clone()))?
                    .clone();
                columns.push(ColumnDetails {
                    column: field.clone(),
                    label: entry.label.clone(),
                    field_type: entry.field_type.to_string(),
                    value_labels: value_labels(entry),
                });
                summarizers.push(Box::new(move |rows: &[usize]| {
                    column_distribution(array.as_ref(), Some(entry), rows)
                }));
            }
        }
    }

    let scopes = scopes
        .iter()
        .map(|scope| {
            let distributions = summarizers.iter().map(|summarize| summarize(&scope.rows)).collect();
            (scope.name.clone(), distributions)
        })
        .collect();

    Ok(ItemSummary {
        domain: item.domain.clone(),
        item: item.item.clone(),
        columns,
        scopes,
        comparisons: Vec::new(),
    })
}

fn value_labels(entry: &DictionaryEntry) -> Vec<(String, String)> {
    entry
        .value_labels
        .iter()
        .flat_map(|labels| labels.iter())
        .map(|(code, label)| (code.to_string(), label.clone()))
        .collect()
}

fn checkbox_counts(options: &[(String, &BooleanArray)], rows: &[usize]) -> Distribution {
    let counts: Vec<(String, usize)> = options
        .iter()
        .map(|(label, array)| {
            let checked = rows
                .iter()
                .filter(|&&row| array.is_valid(row) && array.value(row))
                .count();
            (label.clone(), checked)
        })
        .collect();
    if counts.is_empty() {
        Distribution::Empty
    } else {
        Distribution::Counts(counts)
    }
}

fn column_distribution(array: &dyn Array, entry: Option<&DictionaryEntry>, rows: &[usize]) -> Distribution {
    let any = array.as_any();

    if let Some(floats) = any.downcast_ref::<Float64Array>() {
        let values: Vec<f64> = rows
            .iter()
            .filter(|&&row| floats.is_valid(row))
            .map(|&row| floats.value(row))
            .collect();
        return describe(&values).map_or(Distribution::Empty, |description| Distribution::Numeric {
            description,
            histogram: histogram(&values, HISTOGRAM_BINS),
        });
    }

    let values: Vec<String> = if let Some(flags) = any.downcast_ref::<BooleanArray>() {
        let unchecked = rows.iter().filter(|&&r| flags.is_valid(r) && !flags.value(r)).count();
        let checked = rows.iter().filter(|&&r| flags.is_valid(r) && flags.value(r)).count();
        if unchecked + checked == 0 {
            return Distribution::Empty;
        }
        return Distribution::Counts(vec![
            ("Unchecked".to_string(), unchecked),
            ("Checked".to_string(), checked),
        ]);
    } else if let Some(dates) = any.downcast_ref::<Date32Array>() {
        rows.iter()
            .filter(|&&row| dates.is_valid(row))
            .filter_map(|&row| {
                NaiveDate::default().checked_add_signed(TimeDelta::days(i64::from(dates.value(row))))
            })
            .map(|date| date.format("%Y-%m-%d").to_string())
            .collect()
    } else if let Some(strings) = any.downcast_ref::<StringArray>() {
        rows.iter()
            .filter(|&&row| strings.is_valid(row))
            .map(|&row| strings.value(row).trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    if values.is_empty() {
        return Distribution::Empty;
    }

    match entry.filter(|entry| entry.field_type.has_choices()) {
        Some(entry) => Distribution::Counts(choice_counts(entry, &values)),
        None => Distribution::Counts(value_counts(&values)),
    }
}

/// Counts per declared choice in declared order, then undeclared codes
fn choice_counts(entry: &DictionaryEntry, values: &[String]) -> Vec<(String, usize)> {
    let mut tally: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        *tally.entry(normalize_code(value)).or_default() += 1;
    }

    let mut counts = Vec::new();
    for (code, label) in entry.value_labels.iter().flat_map(|labels| labels.iter()) {
        let count = tally.remove(&normalize_code(code)).unwrap_or(0);
        counts.push((label.clone(), count));
    }
    counts.extend(tally);
    counts
}

/// Counts per distinct value, most frequent first, ties by value
fn value_counts(values: &[String]) -> Vec<(String, usize)> {
    values
        .iter()
        .counts()
        .into_iter()
        .map(|(value, count)| (value.clone(), count))
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .collect()
}
