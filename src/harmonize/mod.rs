//! Column harmonization across language cohorts.
//!
//! Every cohort table is brought onto one column schema independently; the
//! only point where cohorts meet is [`concatenate`], and it refuses to run
//! unless all column sets are identical.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::config::{CohortSpec, QUESTIONNAIRE_COMPLETE, SURVEY_COLUMN};
use crate::error::{PipelineError, Result};
use crate::table::{column_names, project_by_name, rename_columns, with_constant_column};

fn separator_runs() -> &'static Regex {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    RUNS.get_or_init(|| Regex::new(r"_{2,}").expect("separator regex"))
}

/// Collapse runs of underscores to one (`msoc_bas__46` -> `msoc_bas_46`)
#[must_use]
pub fn collapse_separators(name: &str) -> String {
    separator_runs().replace_all(name, "_").into_owned()
}

/// One cohort table on the shared column schema
#[derive(Debug, Clone)]
pub struct HarmonizedCohort {
    pub spec: CohortSpec,
    pub batch: RecordBatch,
}

/// Harmonized column names for one cohort's raw column names
///
/// Separator runs are collapsed first, then the rename table is applied,
/// then the cohort's questionnaire-complete column gets its canonical name.
#[must_use]
pub fn harmonized_names(
    spec: &CohortSpec,
    raw_names: &[String],
    renames: &[(String, String)],
) -> Vec<String> {
    let complete_column = collapse_separators(&spec.complete_column);

    raw_names
        .iter()
        .map(|raw| {
            let mut name = collapse_separators(raw);
            if let Some((_, to)) = renames.iter().find(|(from, _)| *from == name) {
                name.clone_from(to);
            }
            if name == complete_column {
                name = QUESTIONNAIRE_COMPLETE.to_string();
            }
            name
        })
        .collect()
}

/// Rename one cohort's columns and tag its rows with the survey label
pub fn harmonize_cohort(
    spec: &CohortSpec,
    batch: &RecordBatch,
    renames: &[(String, String)],
) -> Result<HarmonizedCohort> {
    let mut names = harmonized_names(spec, &column_names(batch), renames);
    names.push(SURVEY_COLUMN.to_string());

    let mut seen = FxHashSet::default();
    let duplicates: Vec<String> = names
        .iter()
        .filter(|name| !seen.insert(name.as_str()))
        .unique()
        .cloned()
        .collect();
    if !duplicates.is_empty() {
        return Err(PipelineError::DuplicateColumns {
            cohort: spec.key.clone(),
            columns: duplicates,
        });
    }
    names.pop();

    let renamed = rename_columns(batch, &names)?;
    let tagged = with_constant_column(&renamed, SURVEY_COLUMN, &spec.survey)?;

    log::debug!(
        "Harmonized cohort '{}': {} rows, {} columns",
        spec.key,
        tagged.num_rows(),
        tagged.num_columns()
    );

    Ok(HarmonizedCohort {
        spec: spec.clone(),
        batch: tagged,
    })
}

/// Columns one cohort has beyond those shared by every cohort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortDifference {
    pub cohort: String,
    pub extra: BTreeSet<String>,
}

/// Per-cohort differences from the intersection of all column sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMismatch {
    pub differences: Vec<CohortDifference>,
}

impl fmt::Display for ColumnMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for difference in &self.differences {
            if difference.extra.is_empty() {
                writeln!(f, "  {}: no extra columns", difference.cohort)?;
            } else {
                writeln!(
                    f,
                    "  {}: not in every cohort: {}",
                    difference.cohort,
                    difference.extra.iter().join(", ")
                )?;
            }
        }
        Ok(())
    }
}

/// Verify every cohort exposes the same column set
///
/// On failure the error lists, per cohort, the columns outside the
/// intersection of all cohorts' columns.
pub fn check_column_sets(cohorts: &[HarmonizedCohort]) -> Result<()> {
    let sets: Vec<BTreeSet<String>> = cohorts
        .iter()
        .map(|cohort| column_names(&cohort.batch).into_iter().collect())
        .collect();

    let Some(first) = sets.first() else {
        return Ok(());
    };
    if sets.iter().all(|set| set == first) {
        return Ok(());
    }

    let intersection: BTreeSet<String> = sets
        .iter()
        .skip(1)
        .fold(first.clone(), |acc, set| acc.intersection(set).cloned().collect());

    let differences = cohorts
        .iter()
        .zip(&sets)
        .map(|(cohort, set)| CohortDifference {
            cohort: cohort.spec.key.clone(),
            extra: set.difference(&intersection).cloned().collect(),
        })
        .collect();

    Err(PipelineError::ColumnMismatch(ColumnMismatch { differences }))
}

/// Stack harmonized cohorts in the given order
///
/// Columns follow the first cohort's order; rows keep cohort order and
/// within-cohort order. No deduplication.
pub fn concatenate(cohorts: &[HarmonizedCohort]) -> Result<RecordBatch> {
    check_column_sets(cohorts)?;

    let first = cohorts
        .first()
        .ok_or_else(|| PipelineError::Config("no cohort tables to concatenate".to_string()))?;
    let order = column_names(&first.batch);
    let schema = first.batch.schema();

    let aligned = cohorts
        .iter()
        .map(|cohort| project_by_name(&cohort.batch, &order))
        .collect::<Result<Vec<_>>>()?;

    Ok(concat_batches(&schema, &aligned)?)
}

/// The combined table with per-cohort row counts
#[derive(Debug, Clone)]
pub struct CombinedTable {
    pub batch: RecordBatch,
    /// Cohort key -> rows contributed, in concatenation order
    pub row_counts: Vec<(String, usize)>,
}

impl CombinedTable {
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Harmonize and concatenate cohort tables, in the order given
pub fn harmonize(
    cohorts: Vec<(CohortSpec, RecordBatch)>,
    renames: &[(String, String)],
) -> Result<CombinedTable> {
    if cohorts.is_empty() {
        return Err(PipelineError::Config(
            "no cohort tables were loaded".to_string(),
        ));
    }

    let harmonized = cohorts
        .iter()
        .map(|(spec, batch)| harmonize_cohort(spec, batch, renames))
        .collect::<Result<Vec<_>>>()?;
    drop(cohorts);

    let batch = concatenate(&harmonized)?;
    let row_counts = harmonized
        .iter()
        .map(|cohort| (cohort.spec.key.clone(), cohort.batch.num_rows()))
        .collect();

    log::info!(
        "Combined {} cohorts into {} rows and {} columns",
        harmonized.len(),
        batch.num_rows(),
        batch.num_columns()
    );

    Ok(CombinedTable { batch, row_counts })
}
