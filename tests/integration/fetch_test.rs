use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use survey_harmonizer::config::RetryPolicy;
use survey_harmonizer::fetch::{
    ExportContent, ExportSource, FetchError, FetchOutcome, acquire_cohorts,
};
use survey_harmonizer::table::read_tsv;

use crate::utils::{ENGLISH_RECORDS, TestProject, text_values};

const METADATA_CSV: &str = "\
field_name,field_type,field_label,select_choices_or_calculations
age,text,Age,
";

const RECORDS_CSV: &str = "\
record_id,age,comment
1,30,\"fine, thanks\"
2,,
";

/// Answers every export from memory, failing for selected tokens
struct FakeSource {
    failing_tokens: Vec<&'static str>,
    calls: Mutex<Vec<(String, ExportContent)>>,
}

impl FakeSource {
    fn new(failing_tokens: Vec<&'static str>) -> Self {
        Self {
            failing_tokens,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, ExportContent)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl ExportSource for FakeSource {
    fn export<'a>(
        &'a self,
        token: &'a str,
        content: ExportContent,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((token.to_string(), content));
            }
            if self.failing_tokens.iter().any(|failing| *failing == token) {
                return Err(FetchError::Status {
                    status: 503,
                    body: "maintenance".into(),
                });
            }
            Ok(match content {
                ExportContent::Metadata => METADATA_CSV.to_string(),
                ExportContent::Records => RECORDS_CSV.to_string(),
            })
        })
    }
}

fn project() -> TestProject {
    let mut project = TestProject::new(&[
        ("english", "english", "english_complete"),
        ("spanish", "spanish", "spanish_complete"),
        ("chinese", "chinese", "chinese_complete"),
    ]);
    project.config.fetch.retry = RetryPolicy {
        timeout: Duration::from_secs(5),
        max_attempts: 2,
        initial_backoff: Duration::ZERO,
        max_jitter: Duration::ZERO,
    };
    project
}

#[tokio::test]
async fn test_cache_first_then_api() -> survey_harmonizer::Result<()> {
    let mut project = project();
    project.write_records("english", ENGLISH_RECORDS);
    project.config.fetch.tokens.insert("english".into(), "tok-en".into());
    project.config.fetch.tokens.insert("spanish".into(), "tok-es".into());
    let source = FakeSource::new(Vec::new());

    let acquired = acquire_cohorts(&project.config, Some(&source)).await;

    let outcomes: Vec<_> = acquired.report.outcomes.iter().map(|(_, o)| o.clone()).collect();
    assert_eq!(outcomes[0], FetchOutcome::Cached { rows: 2 });
    assert_eq!(outcomes[1], FetchOutcome::Fetched { rows: 2 });
    assert!(matches!(outcomes[2], FetchOutcome::Failed(_)));

    // The cached cohort never reaches the API
    assert_eq!(
        source.calls(),
        vec![
            ("tok-es".to_string(), ExportContent::Metadata),
            ("tok-es".to_string(), ExportContent::Records),
        ]
    );

    // Both exports were cached as TSV for the next run
    let cached = read_tsv(&project.config.records_path("spanish"))?;
    assert_eq!(text_values(&cached, "comment")[0].as_deref(), Some("fine, thanks"));
    assert!(project.config.metadata_path("spanish").exists());

    let keys: Vec<_> = acquired.tables.iter().map(|(spec, _)| spec.key.as_str()).collect();
    assert_eq!(keys, vec!["english", "spanish"]);
    Ok(())
}

#[tokio::test]
async fn test_one_failing_cohort_does_not_stop_the_others() {
    let mut project = project();
    for (key, token) in [("english", "ok-1"), ("spanish", "down"), ("chinese", "ok-2")] {
        project.config.fetch.tokens.insert(key.into(), token.into());
    }
    let source = FakeSource::new(vec!["down"]);

    let acquired = acquire_cohorts(&project.config, Some(&source)).await;

    assert_eq!(acquired.tables.len(), 2);
    let failures = acquired.report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].item, "spanish");
    assert!(failures[0].reason.contains("503"));

    // Retryable failure: both attempts of the metadata export, nothing more
    let spanish_calls = source.calls().into_iter().filter(|(t, _)| t == "down").count();
    assert_eq!(spanish_calls, 2);
    assert!(!project.config.records_path("spanish").exists());
}

#[tokio::test]
async fn test_without_api_only_cache_is_used() {
    let project = project();
    project.write_records("chinese", ENGLISH_RECORDS);

    let acquired = acquire_cohorts(&project.config, None).await;

    assert_eq!(acquired.tables.len(), 1);
    assert_eq!(acquired.report.failures().len(), 2);
    let display = acquired.report.outcomes[2].1.to_string();
    assert_eq!(display, "loaded from cache (2 rows)");
}
