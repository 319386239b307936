//! Stage orchestration: pull, validate and report.
//!
//! Each stage reads the artifacts of the previous one from disk, so the
//! binaries can be run independently.

use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::record_batch::RecordBatch;

use crate::config::{CohortSpec, ColumnConfig, PipelineConfig};
use crate::dictionary::{DataDictionary, DictionaryBuild, build_dictionary};
use crate::error::util::{
    ensure_directory, ensure_nonempty_file, write_all_atomically, write_atomically,
};
use crate::error::{PipelineError, Result};
use crate::fetch::{ExportSource, FetchReport, RedcapClient, acquire_cohorts};
use crate::harmonize::{CombinedTable, harmonize};
use crate::metadata::{FieldMetadata, load_metadata};
use crate::report::{ReportOptions, generate_report, load_domain_map};
use crate::table::{apply_dictionary, read_tsv, to_tsv_string};
use crate::utils::logging::console::{print_artifact, print_fetch_report, print_table_summary};
use crate::utils::logging::{
    create_spinner, finish_progress_bar, log_failures, log_operation_complete,
    log_operation_start, log_warning,
};
use crate::validate::{ValidationReport, validate};

/// The two artifacts every later stage consumes
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub combined: CombinedTable,
    pub build: DictionaryBuild,
}

impl Artifacts {
    #[must_use]
    pub fn dictionary(&self) -> &DataDictionary {
        &self.build.dictionary
    }
}

/// Outcome of the pull stage
#[derive(Debug, Clone)]
pub struct PullSummary {
    pub fetch: FetchReport,
    /// Cohort key -> rows contributed to the combined table
    pub row_counts: Vec<(String, usize)>,
    pub dictionary_entries: usize,
    pub combined_path: PathBuf,
    pub dictionary_path: PathBuf,
}

/// Harmonize the cohort tables and build the dictionary, without touching disk
pub fn build_artifacts(
    cohorts: Vec<(CohortSpec, RecordBatch)>,
    fields: &[FieldMetadata],
    column_config: &ColumnConfig,
    renames: &[(String, String)],
) -> Result<Artifacts> {
    let combined = harmonize(cohorts, renames)?;
    let build = build_dictionary(fields, &combined.batch, column_config);
    Ok(Artifacts { combined, build })
}

/// Write the combined table and the dictionary as a pair, then confirm both exist
///
/// Both are serialized before anything touches disk and replaced together,
/// so a failure never leaves a new table next to an old dictionary.
pub fn write_artifacts(artifacts: &Artifacts, config: &PipelineConfig) -> Result<()> {
    ensure_directory(&config.data_dir)?;
    ensure_directory(&config.reference_dir)?;

    let combined_path = config.combined_path();
    let dictionary_path = config.dictionary_path();
    let combined = to_tsv_string(&artifacts.combined.batch)?;
    let dictionary = artifacts.dictionary().to_json_string()?;
    write_all_atomically(&[
        (combined_path.as_path(), combined.as_bytes()),
        (dictionary_path.as_path(), dictionary.as_bytes()),
    ])?;
    log::info!(
        "Saved : {} ({} rows), {} ({} entries)",
        combined_path.display(),
        artifacts.combined.num_rows(),
        dictionary_path.display(),
        artifacts.dictionary().len()
    );

    for path in [&combined_path, &dictionary_path] {
        verify_artifact(path)?;
    }
    Ok(())
}

/// Check an artifact is in place and report where it is
pub fn verify_artifact(path: &Path) -> Result<u64> {
    let size = ensure_nonempty_file(path)?;
    log::info!("Verified {} ({size} bytes)", path.display());
    Ok(size)
}

/// Stage 01: acquire cohorts, harmonize, build and persist the dictionary
///
/// Nothing is written unless every fatal check passes; a column-set mismatch
/// surfaces as [`PipelineError::ColumnMismatch`] with no artifact touched.
pub async fn run_pull(config: &PipelineConfig) -> Result<PullSummary> {
    let start = Instant::now();
    log_operation_start("Pulling and harmonizing survey exports into", &config.data_dir);

    let column_config = ColumnConfig::load(&config.column_config_path())?;

    let client = config
        .fetch
        .api_url
        .as_deref()
        .map(|url| RedcapClient::new(url, config.fetch.retry.timeout))
        .transpose()
        .map_err(|e| PipelineError::Config(format!("cannot create API client: {e}")))?;
    if client.is_none() {
        log_warning("API_URL not set, using cached exports only", None);
    }

    let acquired = acquire_cohorts(
        config,
        client.as_ref().map(|client| client as &dyn ExportSource),
    )
    .await;
    print_fetch_report(&acquired.report);
    log_failures("cohort acquisition", acquired.report.failures());

    let metadata_path = config.metadata_path(&config.authoritative_cohort);
    if !metadata_path.exists() {
        return Err(PipelineError::Metadata(format!(
            "authoritative metadata for '{}' not found at {}",
            config.authoritative_cohort,
            metadata_path.display()
        )));
    }
    let metadata = load_metadata(&metadata_path)?;
    log_failures("metadata fields", &metadata.failures);
    log_failures("choice entries", &metadata.skipped_choices);

    let artifacts = build_artifacts(
        acquired.tables,
        &metadata.fields,
        &column_config,
        &config.column_renames,
    )?;
    artifacts.build.log_summary();
    print_table_summary("Combined table", &artifacts.combined.batch);

    write_artifacts(&artifacts, config)?;
    print_artifact("Combined data", &config.combined_path());
    print_artifact("Data dictionary", &config.dictionary_path());

    log_operation_complete(
        "harmonized",
        &config.raw_dir(),
        artifacts.combined.num_rows(),
        Some(start.elapsed()),
    );

    Ok(PullSummary {
        fetch: acquired.report,
        row_counts: artifacts.combined.row_counts,
        dictionary_entries: artifacts.build.dictionary.len(),
        combined_path: config.combined_path(),
        dictionary_path: config.dictionary_path(),
    })
}

/// Read both artifacts as written by the pull stage
pub fn load_artifacts(config: &PipelineConfig) -> Result<(RecordBatch, DataDictionary)> {
    let combined_path = config.combined_path();
    let dictionary_path = config.dictionary_path();
    for path in [&combined_path, &dictionary_path] {
        ensure_nonempty_file(path)?;
    }
    let combined = read_tsv(&combined_path)?;
    let dictionary = DataDictionary::load(&dictionary_path)?;
    Ok((combined, dictionary))
}

/// The combined table typed by the dictionary, plus the dictionary
pub fn load_data(config: &PipelineConfig) -> Result<(RecordBatch, DataDictionary)> {
    let (combined, dictionary) = load_artifacts(config)?;
    let typed = apply_dictionary(&combined, &dictionary, &config.date_formats)?;
    Ok((typed, dictionary))
}

/// Stage 02: audit the combined table against the dictionary
///
/// Findings are returned, never raised; the column-type listing is written
/// to `reference/data_types.tsv`.
pub fn run_validate(config: &PipelineConfig) -> Result<ValidationReport> {
    let start = Instant::now();
    log_operation_start("Validating", &config.combined_path());

    let (combined, dictionary) = load_artifacts(config)?;
    print_table_summary("Combined table", &combined);

    let spinner = create_spinner(Some("Running consistency checks"));
    let report = validate(&combined, &dictionary, &config.date_formats)?;
    finish_progress_bar(&spinner, Some("Checks complete"));

    let types_path = config.data_types_path();
    report.write_column_types(&types_path)?;
    verify_artifact(&types_path)?;
    print_artifact("Column types", &types_path);

    log::info!("Validation produced {} findings", report.findings.len());
    log_operation_complete(
        "validated",
        &config.combined_path(),
        combined.num_rows(),
        Some(start.elapsed()),
    );
    Ok(report)
}

/// Stage 03: render the domain report and write it next to the data
pub fn run_report(config: &PipelineConfig, options: &ReportOptions) -> Result<PathBuf> {
    let start = Instant::now();
    log_operation_start("Generating domain report from", &config.domain_map_path());

    let (combined, dictionary) = load_artifacts(config)?;
    let items = load_domain_map(&config.domain_map_path())?;

    let html = generate_report(&combined, &dictionary, &items, &config.date_formats, options)?;

    let path = config.report_path();
    write_atomically(&path, |writer| {
        use std::io::Write;
        writer
            .write_all(html.as_bytes())
            .map_err(|e| PipelineError::io("failed to write report", &path, e))
    })?;
    verify_artifact(&path)?;
    print_artifact("Report", &path);

    log_operation_complete(
        "reported on",
        &config.combined_path(),
        combined.num_rows(),
        Some(start.elapsed()),
    );
    Ok(path)
}
