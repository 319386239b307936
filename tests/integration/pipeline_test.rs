use arrow::datatypes::DataType;
use survey_harmonizer::{
    DataDictionary, FieldType, PipelineError, load_data, run_pull, run_validate,
};

use crate::utils::{TestProject, names, three_cohort_project};

fn artifacts_absent(project: &TestProject) -> bool {
    !project.config.combined_path().exists() && !project.config.dictionary_path().exists()
}

#[tokio::test]
async fn test_pull_end_to_end() -> survey_harmonizer::Result<()> {
    let project = three_cohort_project();

    let summary = run_pull(&project.config).await?;

    assert_eq!(
        summary.row_counts,
        vec![
            ("english".to_string(), 2),
            ("spanish".to_string(), 2),
            ("chinese".to_string(), 3),
        ]
    );
    assert!(summary.fetch.failures().is_empty());
    assert_eq!(summary.dictionary_entries, 5);

    let (typed, dictionary) = load_data(&project.config)?;
    assert_eq!(typed.num_rows(), 7);
    assert_eq!(
        names(&typed),
        vec![
            "record_id",
            "msoc_bas_46",
            "age",
            "nickname",
            "color_1",
            "color_2",
            "questionnaire_complete",
            "survey",
        ]
    );

    assert_eq!(dictionary.entry("msoc_bas_46")?.field_type, FieldType::Radio);
    assert_eq!(dictionary.entry("msoc_bas_46")?.label, "Household size");
    assert_eq!(dictionary.entry("age")?.field_type, FieldType::Numeric);
    assert_eq!(dictionary.entry("nickname")?.field_type, FieldType::Text);
    assert_eq!(dictionary.entry("color")?.label, "Favourite colours");

    // Every exploded column the dictionary promises is in the combined table
    for (_, entry) in dictionary.iter() {
        for column in entry.exploded_fields.iter().flatten() {
            assert!(typed.column_by_name(column).is_some(), "missing {column}");
        }
    }

    let schema = typed.schema();
    assert_eq!(schema.field_with_name("age")?.data_type(), &DataType::Float64);
    assert_eq!(schema.field_with_name("color_1")?.data_type(), &DataType::Boolean);
    assert_eq!(schema.field_with_name("nickname")?.data_type(), &DataType::Utf8);
    Ok(())
}

#[tokio::test]
async fn test_pull_is_idempotent() -> survey_harmonizer::Result<()> {
    let project = three_cohort_project();

    run_pull(&project.config).await?;
    let combined = project.read(&project.config.combined_path());
    let dictionary = project.read(&project.config.dictionary_path());

    run_pull(&project.config).await?;
    assert_eq!(project.read(&project.config.combined_path()), combined);
    assert_eq!(project.read(&project.config.dictionary_path()), dictionary);
    assert!(combined.is_some_and(|text| text.starts_with("record_id\tmsoc_bas_46\t")));
    Ok(())
}

#[tokio::test]
async fn test_column_mismatch_writes_nothing() {
    let project = three_cohort_project();
    project.write_records(
        "spanish",
        "record_id\tmsoc_bas_45\tage\tnickname\tcolor_1\tcolor_2\textra\tmac_sdoh_questionnaire_spanish_complete\n\
         201\t2\t28\tCarlos\t1\t1\tx\t2\n",
    );

    let Err(PipelineError::ColumnMismatch(mismatch)) = run_pull(&project.config).await else {
        panic!("expected the pull to halt on a column mismatch");
    };

    let spanish = mismatch
        .differences
        .iter()
        .find(|difference| difference.cohort == "spanish")
        .expect("spanish difference");
    assert!(spanish.extra.contains("extra"));
    assert!(artifacts_absent(&project));
}

#[tokio::test]
async fn test_failed_dictionary_write_leaves_no_combined_table() {
    let project = three_cohort_project();
    // A directory where the dictionary belongs makes its final rename fail
    std::fs::create_dir_all(project.config.dictionary_path()).expect("block dictionary path");

    let err = run_pull(&project.config).await.unwrap_err();

    assert!(matches!(err, PipelineError::Io { .. }));
    assert!(!project.config.combined_path().exists());
    assert!(project.config.dictionary_path().is_dir());
}

#[tokio::test]
async fn test_missing_authoritative_metadata_is_fatal() {
    let project = three_cohort_project();
    std::fs::remove_file(project.config.metadata_path("english")).expect("remove metadata");

    let err = run_pull(&project.config).await.unwrap_err();

    assert!(matches!(err, PipelineError::Metadata(_)));
    assert!(artifacts_absent(&project));
}

#[tokio::test]
async fn test_missing_column_config_is_fatal() {
    let project = three_cohort_project();
    std::fs::remove_file(project.config.column_config_path()).expect("remove column config");

    assert!(run_pull(&project.config).await.is_err());
    assert!(artifacts_absent(&project));
}

#[tokio::test]
async fn test_failed_cohort_is_skipped() -> survey_harmonizer::Result<()> {
    let project = three_cohort_project();
    std::fs::remove_file(project.config.records_path("chinese")).expect("remove records");

    let summary = run_pull(&project.config).await?;

    assert_eq!(summary.fetch.failures().len(), 1);
    assert_eq!(summary.row_counts.len(), 2);
    let dictionary = DataDictionary::load(&summary.dictionary_path)?;
    assert!(dictionary.get("color").is_some());
    Ok(())
}

#[tokio::test]
async fn test_validate_after_pull() -> survey_harmonizer::Result<()> {
    let project = three_cohort_project();
    run_pull(&project.config).await?;

    let report = run_validate(&project.config)?;

    assert!(report.is_clean(), "unexpected findings: {:?}", report.findings);
    let types = project
        .read(&project.config.data_types_path())
        .unwrap_or_default();
    assert!(types.starts_with("column\tobserved_type\n"));
    assert!(types.contains("nickname\tstring\n"));
    assert!(types.contains("color_1\tboolean\n"));
    Ok(())
}

#[test]
fn test_validate_requires_artifacts() {
    let project = three_cohort_project();
    let err = run_validate(&project.config).unwrap_err();
    assert!(matches!(err, PipelineError::MissingArtifact(_)));
}
