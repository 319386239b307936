//! Configuration for the survey pipeline.

pub mod column_config;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};

pub use column_config::ColumnConfig;

/// Canonical name every cohort's questionnaire-complete column is renamed to
pub const QUESTIONNAIRE_COMPLETE: &str = "questionnaire_complete";

/// Name of the cohort tag column added to every harmonized table
pub const SURVEY_COLUMN: &str = "survey";

/// One language/script variant of the survey instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortSpec {
    /// Export key, also the stem of the cached files (`data/raw/{key}.tsv`)
    pub key: String,
    /// Value written to the `survey` column; script variants share one
    pub survey: String,
    /// This cohort's questionnaire-complete column before renaming
    pub complete_column: String,
}

impl CohortSpec {
    pub fn new(
        key: impl Into<String>,
        survey: impl Into<String>,
        complete_column: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            survey: survey.into(),
            complete_column: complete_column.into(),
        }
    }
}

/// Timeout and retry settings for API exports
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Per-request timeout
    pub timeout: Duration,
    /// Total attempts per request, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each further retry
    pub initial_backoff: Duration,
    /// Upper bound of the random jitter added to every backoff
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt` (1-based, so attempt 2 is the first retry)
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(16);
        self.initial_backoff.saturating_mul(1u32 << exponent)
    }
}

/// REDCap API access
#[derive(Debug, Clone, Default)]
pub struct FetchConfig {
    /// API endpoint; without it only cached exports are used
    pub api_url: Option<String>,
    /// Access token per cohort key
    pub tokens: BTreeMap<String, String>,
    pub retry: RetryPolicy,
}

/// Configuration for date format handling
#[derive(Debug, Clone)]
pub struct DateFormatConfig {
    /// Date format strings tried in order when recognising or parsing dates
    pub date_formats: Vec<String>,
}

impl Default for DateFormatConfig {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%Y-%m-%d".to_string(), // REDCap date_ymd: 2023-01-15
                "%Y/%m/%d".to_string(), // 2023/01/15
                "%m/%d/%Y".to_string(), // US: 01/15/2023
            ],
        }
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding `raw/` exports and the combined table
    pub data_dir: PathBuf,
    /// Directory holding curated config, the dictionary and the domain map
    pub reference_dir: PathBuf,
    /// Cohorts in concatenation order
    pub cohorts: Vec<CohortSpec>,
    /// Known per-cohort misnamed columns, applied after separator collapsing
    pub column_renames: Vec<(String, String)>,
    /// Cohort whose metadata export defines the field catalogue
    pub authoritative_cohort: String,
    pub fetch: FetchConfig,
    pub date_formats: DateFormatConfig,
    /// Exit non-zero from the validate stage when findings exist
    pub strict_validation: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_root(Path::new("."))
    }
}

impl PipelineConfig {
    /// Default catalogue with `data/` and `reference/` under `root`
    #[must_use]
    pub fn with_root(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            reference_dir: root.join("reference"),
            cohorts: vec![
                CohortSpec::new(
                    "english",
                    "english",
                    "mac_sdoh_questionnaire_english_complete",
                ),
                CohortSpec::new(
                    "spanish",
                    "spanish",
                    "mac_sdoh_questionnaire_spanish_complete",
                ),
                CohortSpec::new(
                    "chinese_traditional",
                    "chinese",
                    "mac_sdoh_questionnaire_traditional_chinese_complete",
                ),
                CohortSpec::new(
                    "chinese_simplified",
                    "chinese",
                    "mac_sdoh_questionnaire_chinese_complete",
                ),
            ],
            column_renames: vec![("msoc_bas_45".to_string(), "msoc_bas_46".to_string())],
            authoritative_cohort: "english".to_string(),
            fetch: FetchConfig::default(),
            date_formats: DateFormatConfig::default(),
            strict_validation: false,
        }
    }

    /// Default configuration overlaid with environment variables
    ///
    /// * `SURVEY_ROOT` - project root (default: current directory)
    /// * `API_URL` - REDCap API endpoint
    /// * `API_TOKEN` - JSON object mapping cohort key to access token
    /// * `SURVEY_FETCH_TIMEOUT_SECS`, `SURVEY_FETCH_ATTEMPTS`
    /// * `SURVEY_STRICT_VALIDATION` - `1`/`true` to fail on findings
    pub fn from_env() -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self::from_lookup(lookup)
    }

    /// Same as [`PipelineConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = lookup("SURVEY_ROOT").map_or_else(|| PathBuf::from("."), PathBuf::from);
        let mut config = Self::with_root(&root);

        config.fetch.api_url = lookup("API_URL");

        if let Some(raw) = lookup("API_TOKEN") {
            config.fetch.tokens = serde_json::from_str(&raw).map_err(|e| {
                PipelineError::Config(format!(
                    "API_TOKEN must be a JSON object of cohort -> token: {e}"
                ))
            })?;
        }

        if let Some(raw) = lookup("SURVEY_FETCH_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                PipelineError::Config(format!("SURVEY_FETCH_TIMEOUT_SECS is not a number: {raw}"))
            })?;
            config.fetch.retry.timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("SURVEY_FETCH_ATTEMPTS") {
            let attempts: u32 = raw.trim().parse().ok().filter(|n| *n > 0).ok_or_else(|| {
                PipelineError::Config(format!(
                    "SURVEY_FETCH_ATTEMPTS must be a positive integer: {raw}"
                ))
            })?;
            config.fetch.retry.max_attempts = attempts;
        }

        if let Some(raw) = lookup("SURVEY_STRICT_VALIDATION") {
            config.strict_validation = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }

        Ok(config)
    }

    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Cached records export of a cohort
    #[must_use]
    pub fn records_path(&self, cohort_key: &str) -> PathBuf {
        self.raw_dir().join(format!("{cohort_key}.tsv"))
    }

    /// Cached metadata export of a cohort
    #[must_use]
    pub fn metadata_path(&self, cohort_key: &str) -> PathBuf {
        self.raw_dir().join(format!("{cohort_key}_metadata.tsv"))
    }

    #[must_use]
    pub fn combined_path(&self) -> PathBuf {
        self.data_dir.join("combined.tsv")
    }

    #[must_use]
    pub fn dictionary_path(&self) -> PathBuf {
        self.reference_dir.join("data_dictionary.json")
    }

    #[must_use]
    pub fn column_config_path(&self) -> PathBuf {
        self.reference_dir.join("column_config.json")
    }

    #[must_use]
    pub fn domain_map_path(&self) -> PathBuf {
        self.reference_dir.join("domain_map.tsv")
    }

    #[must_use]
    pub fn data_types_path(&self) -> PathBuf {
        self.reference_dir.join("data_types.tsv")
    }

    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.data_dir
            .parent()
            .map_or_else(|| PathBuf::from("domain_report.html"), |root| root.join("domain_report.html"))
    }
}
