//! Pairwise cohort comparisons for report items.
//!
//! Numeric columns get a two-sample t-test with pooled variance; every other
//! column gets a chi-square test on the cohort x value contingency table.

use std::collections::BTreeMap;
use std::fmt;

use arrow::array::{Array, BooleanArray, Date32Array, Float64Array, StringArray};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

use crate::dictionary::{DataDictionary, Explosion};
use crate::error::Result;
use crate::report::domain_map::DomainItem;
use crate::report::summary::Scope;
use crate::table::observe::normalize_code;

/// Which significance test produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    ChiSquare,
    TTest,
}

impl TestKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ChiSquare => "Chi-square",
            Self::TTest => "T-test",
        }
    }
}

/// Outcome of one test between two cohorts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairTest {
    pub kind: TestKind,
    pub statistic: f64,
    pub p_value: f64,
}

impl fmt::Display for PairTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} p = {:.4}", self.kind.name(), self.p_value)
    }
}

/// Test results of one column, one per cohort pair
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnComparison {
    pub column: String,
    /// `"a vs b"` -> result; `None` when the data cannot support the test
    pub results: Vec<(String, Option<PairTest>)>,
}

/// Chi-square test of independence on a contingency table
///
/// Rows are cohorts, columns are values. Values absent from every cohort
/// must already be dropped. Tables with one degree of freedom get Yates'
/// continuity correction.
#[must_use]
pub fn chi_square(table: &[Vec<usize>]) -> Option<PairTest> {
    let width = table.first()?.len();
    if table.len() < 2 || width < 2 || table.iter().any(|row| row.len() != width) {
        return None;
    }

    let row_totals: Vec<f64> = table.iter().map(|row| row.iter().sum::<usize>() as f64).collect();
    let column_totals: Vec<f64> = (0..width)
        .map(|column| table.iter().map(|row| row[column]).sum::<usize>() as f64)
        .collect();
    if row_totals.iter().chain(&column_totals).any(|total| *total == 0.0) {
        return None;
    }
    let total: f64 = row_totals.iter().sum();
    let dof = (table.len() - 1) * (width - 1);

    let mut statistic = 0.0;
    for (row, counts) in table.iter().enumerate() {
        for (column, &observed) in counts.iter().enumerate() {
            let expected = row_totals[row] * column_totals[column] / total;
            let mut deviation = (observed as f64 - expected).abs();
            if dof == 1 {
                deviation = (deviation - 0.5).max(0.0);
            }
            statistic += deviation * deviation / expected;
        }
    }

    let p_value = ChiSquared::new(dof as f64).ok()?.sf(statistic);
    Some(PairTest {
        kind: TestKind::ChiSquare,
        statistic,
        p_value,
    })
}

/// Two-sided t-test of equal means, pooled variance
#[must_use]
pub fn t_test(first: &[f64], second: &[f64]) -> Option<PairTest> {
    if first.is_empty() || second.is_empty() || first.len() + second.len() < 3 {
        return None;
    }
    let (n1, n2) = (first.len() as f64, second.len() as f64);
    let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len() as f64;
    let squares = |values: &[f64], m: f64| values.iter().map(|v| (v - m).powi(2)).sum::<f64>();

    let (m1, m2) = (mean(first), mean(second));
    let dof = n1 + n2 - 2.0;
    let pooled = (squares(first, m1) + squares(second, m2)) / dof;
    let standard_error = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
    if !standard_error.is_finite() || standard_error <= 0.0 {
        return None;
    }

    let statistic = (m1 - m2) / standard_error;
    let p_value = 2.0 * StudentsT::new(0.0, 1.0, dof).ok()?.sf(statistic.abs());
    Some(PairTest {
        kind: TestKind::TTest,
        statistic,
        p_value: p_value.min(1.0),
    })
}

/// Compare one typed column between two sets of rows
#[must_use]
pub fn compare_column(array: &dyn Array, first: &[usize], second: &[usize]) -> Option<PairTest> {
    if let Some(floats) = array.as_any().downcast_ref::<Float64Array>() {
        let values = |rows: &[usize]| -> Vec<f64> {
            rows.iter()
                .filter(|&&row| floats.is_valid(row))
                .map(|&row| floats.value(row))
                .collect()
        };
        return t_test(&values(first), &values(second));
    }

    let mut counts: BTreeMap<String, [usize; 2]> = BTreeMap::new();
    for (side, rows) in [first, second].into_iter().enumerate() {
        for &row in rows {
            if let Some(value) = category(array, row) {
                counts.entry(value).or_default()[side] += 1;
            }
        }
    }
    let table: Vec<Vec<usize>> = (0..2)
        .map(|side| counts.values().map(|pair| pair[side]).collect())
        .collect();
    chi_square(&table)
}

fn category(array: &dyn Array, row: usize) -> Option<String> {
    if array.is_null(row) {
        return None;
    }
    let any = array.as_any();
    if let Some(flags) = any.downcast_ref::<BooleanArray>() {
        Some(flags.value(row).to_string())
    } else if let Some(dates) = any.downcast_ref::<Date32Array>() {
        Some(dates.value(row).to_string())
    } else {
        any.downcast_ref::<StringArray>()
            .map(|strings| strings.value(row).trim())
            .filter(|value| !value.is_empty())
            .map(normalize_code)
    }
}

/// Test every column of an item between every pair of survey scopes
///
/// The first scope (all cohorts) takes no part; pairs follow scope order.
pub fn compare_item(
    typed: &RecordBatch,
    dictionary: &DataDictionary,
    item: &DomainItem,
    scopes: &[Scope],
) -> Result<Vec<ColumnComparison>> {
    let pairs: Vec<(&Scope, &Scope)> = scopes.iter().skip(1).tuple_combinations().collect();
    let mut comparisons = Vec::new();

    for field in &item.fields {
        let columns = match dictionary.entry(field)?.explosion() {
            Explosion::Checkbox(columns) | Explosion::NonStandard(columns) => columns.to_vec(),
            Explosion::None => vec![field.clone()],
        };
        for column in columns {
            let Some(array) = typed.column_by_name(&column) else {
                continue;
            };
            let results = pairs
                .iter()
                .map(|(a, b)| {
                    let label = format!("{} vs {}", a.name, b.name);
                    (label, compare_column(array.as_ref(), &a.rows, &b.rows))
                })
                .collect();
            comparisons.push(ColumnComparison { column, results });
        }
    }
    Ok(comparisons)
}
