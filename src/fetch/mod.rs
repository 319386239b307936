//! Cohort acquisition: cached exports first, REDCap API otherwise.
//!
//! Each cohort is acquired on its own and yields an explicit outcome, so one
//! cohort's API failure never keeps the others from loading.

pub mod client;

use std::fmt;
use std::future::Future;
use std::io::Cursor;
use std::path::Path;
use std::pin::Pin;

use arrow::record_batch::RecordBatch;
use rand::Rng;

use crate::config::{CohortSpec, PipelineConfig, RetryPolicy};
use crate::error::util::ensure_directory;
use crate::error::{ItemFailure, PipelineError};
use crate::table::{read_delimited, read_tsv, write_tsv};
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar};

pub use client::RedcapClient;

/// What an export request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportContent {
    /// The project's data dictionary
    Metadata,
    /// All records, flat
    Records,
}

impl ExportContent {
    /// Value of the API `content` parameter
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Records => "record",
        }
    }
}

/// Export failures
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error(transparent)]
    Storage(#[from] PipelineError),
}

impl FetchError {
    /// Timeouts, connection errors, 5xx and 429 are worth another attempt
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Request(_) | Self::Storage(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Anything that can produce a CSV export for a token
pub trait ExportSource: Send + Sync {
    fn export<'a>(
        &'a self,
        token: &'a str,
        content: ExportContent,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>>;
}

fn jitter(max: std::time::Duration) -> std::time::Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return std::time::Duration::ZERO;
    }
    std::time::Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

/// One export with a per-attempt timeout and bounded retries
///
/// Retryable failures back off exponentially with random jitter; anything
/// else, or the last attempt's failure, is returned as is.
pub async fn export_with_retry(
    source: &dyn ExportSource,
    token: &str,
    content: ExportContent,
    policy: &RetryPolicy,
    label: &str,
) -> Result<String, FetchError> {
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.timeout, source.export(token, content)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        };

        match result {
            Ok(body) => return Ok(body),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                attempt += 1;
                let delay = policy.backoff_for(attempt) + jitter(policy.max_jitter);
                log::warn!(
                    "{label} {} export failed ({e}); attempt {attempt}/{} in {delay:?}",
                    content.as_str(),
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// How a cohort's table was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Read from `data/raw/{key}.tsv`
    Cached { rows: usize },
    /// Exported from the API and cached
    Fetched { rows: usize },
    Failed(ItemFailure),
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached { rows } => write!(f, "loaded from cache ({rows} rows)"),
            Self::Fetched { rows } => write!(f, "fetched from API ({rows} rows)"),
            Self::Failed(failure) => write!(f, "FAILED: {}", failure.reason),
        }
    }
}

/// Per-cohort outcomes, in cohort order
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub outcomes: Vec<(String, FetchOutcome)>,
}

impl FetchReport {
    /// Cohorts that could not be loaded
    #[must_use]
    pub fn failures(&self) -> Vec<&ItemFailure> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                FetchOutcome::Failed(failure) => Some(failure),
                _ => None,
            })
            .collect()
    }
}

/// Cohort tables that loaded, plus the outcome of every cohort
#[derive(Debug, Clone, Default)]
pub struct AcquiredCohorts {
    pub tables: Vec<(CohortSpec, RecordBatch)>,
    pub report: FetchReport,
}

/// Load or fetch every configured cohort
pub async fn acquire_cohorts(
    config: &PipelineConfig,
    source: Option<&dyn ExportSource>,
) -> AcquiredCohorts {
    let mut acquired = AcquiredCohorts::default();
    let pb = create_main_progress_bar(config.cohorts.len() as u64, Some("Acquiring cohorts"));

    for spec in &config.cohorts {
        pb.set_message(spec.key.clone());
        let outcome = match acquire_cohort(config, spec, source).await {
            Ok((outcome, batch)) => {
                acquired.tables.push((spec.clone(), batch));
                outcome
            }
            Err(e) => {
                log::error!("Cohort '{}' could not be loaded: {e}", spec.key);
                FetchOutcome::Failed(ItemFailure::new(&spec.key, e.to_string()))
            }
        };
        acquired.report.outcomes.push((spec.key.clone(), outcome));
        pb.inc(1);
    }

    finish_progress_bar(&pb, Some("Cohorts acquired"));
    acquired
}

async fn acquire_cohort(
    config: &PipelineConfig,
    spec: &CohortSpec,
    source: Option<&dyn ExportSource>,
) -> Result<(FetchOutcome, RecordBatch), FetchError> {
    let records_path = config.records_path(&spec.key);
    if records_path.exists() {
        let batch = read_tsv(&records_path)?;
        log::info!("Loaded: {}", records_path.display());
        return Ok((FetchOutcome::Cached { rows: batch.num_rows() }, batch));
    }

    let (Some(source), Some(token)) = (source, config.fetch.tokens.get(&spec.key)) else {
        return Err(FetchError::Request(format!(
            "no cached export at {} and no API access configured",
            records_path.display()
        )));
    };

    ensure_directory(&config.raw_dir())?;
    let policy = &config.fetch.retry;

    let metadata = export_with_retry(source, token, ExportContent::Metadata, policy, &spec.key).await?;
    cache_export(&metadata, &config.metadata_path(&spec.key))?;

    let records = export_with_retry(source, token, ExportContent::Records, policy, &spec.key).await?;
    let batch = cache_export(&records, &records_path)?;

    Ok((FetchOutcome::Fetched { rows: batch.num_rows() }, batch))
}

/// Convert a CSV export to a table and cache it as TSV
fn cache_export(csv: &str, path: &Path) -> Result<RecordBatch, PipelineError> {
    let batch = read_delimited(Cursor::new(csv.as_bytes()), b',')?;
    write_tsv(&batch, path)?;
    Ok(batch)
}
