//! Console output utilities
//!
//! User-facing summaries of each stage, printed to stdout.

use std::path::Path;

use arrow::record_batch::RecordBatch;

use crate::fetch::{FetchOutcome, FetchReport};
use crate::harmonize::ColumnMismatch;
use crate::validate::ValidationReport;

/// Print row and column counts of a table
pub fn print_table_summary(name: &str, batch: &RecordBatch) {
    println!(
        "{name}: {} rows x {} columns",
        batch.num_rows(),
        batch.num_columns()
    );
}

/// Print the outcome of every cohort acquisition
pub fn print_fetch_report(report: &FetchReport) {
    println!("Cohort acquisition:");
    for (cohort, outcome) in &report.outcomes {
        let marker = if matches!(outcome, FetchOutcome::Failed(_)) { "!" } else { "-" };
        println!("  {marker} {cohort}: {outcome}");
    }
}

/// Print which columns keep cohorts from being concatenated
pub fn print_column_differences(mismatch: &ColumnMismatch) {
    println!("Column sets differ across cohorts; nothing was written.");
    print!("{mismatch}");
}

/// Print validation findings grouped by category
pub fn print_validation_report(report: &ValidationReport) {
    if report.is_clean() {
        println!("No consistency problems found.");
        return;
    }

    for (category, findings) in report.by_category() {
        println!("\n{} ({}):", category.title(), findings.len());
        for finding in findings {
            println!("- {finding}");
        }
    }
}

/// Print where an artifact was written
pub fn print_artifact(description: &str, path: &Path) {
    println!("{description} saved to {}", path.display());
}
