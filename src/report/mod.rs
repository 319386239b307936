//! Descriptive domain report over the combined table.

pub mod compare;
pub mod domain_map;
pub mod html;
pub mod summary;

use arrow::record_batch::RecordBatch;

use crate::config::DateFormatConfig;
use crate::dictionary::DataDictionary;
use crate::error::Result;
use crate::table::apply_dictionary;

pub use compare::{ColumnComparison, PairTest, TestKind, chi_square, compare_item, t_test};
pub use domain_map::{DomainItem, check_fields, load_domain_map};
pub use html::{AxisScale, ChartMode, ComparisonMode, ReportOptions, escape_html, render_report};
pub use summary::{Description, Distribution, ItemSummary, describe, summarize_item};

/// Summarize every domain item and render the report document
///
/// Fails before any summary is computed if an item references a field the
/// dictionary does not define.
pub fn generate_report(
    combined: &RecordBatch,
    dictionary: &DataDictionary,
    items: &[DomainItem],
    dates: &DateFormatConfig,
    options: &ReportOptions,
) -> Result<String> {
    check_fields(items, dictionary)?;

    let typed = apply_dictionary(combined, dictionary, dates)?;
    let scopes = summary::scopes(&typed)?;

    let summaries = items
        .iter()
        .map(|item| {
            let mut summary = summarize_item(&typed, dictionary, item, &scopes)?;
            if options.comparisons == ComparisonMode::Pairwise {
                summary.comparisons = compare_item(&typed, dictionary, item, &scopes)?;
            }
            Ok(summary)
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!(
        "Summarized {} items over {} scopes",
        summaries.len(),
        scopes.len()
    );
    Ok(render_report(&summaries, options))
}
