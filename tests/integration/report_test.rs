use survey_harmonizer::report::{AxisScale, ChartMode};
use survey_harmonizer::{ComparisonMode, PipelineError, ReportOptions, run_pull, run_report};

use crate::utils::{COLUMN_CONFIG, TestProject, three_cohort_project};

/// English and Spanish cohorts whose answers separate cleanly
fn two_cohort_project() -> TestProject {
    let project = TestProject::new(&[
        ("english", "english", "eng_complete"),
        ("spanish", "spanish", "spa_complete"),
    ]);
    project.write_metadata(
        "english",
        "field_name\tfield_type\tfield_label\tselect_choices_or_calculations\n\
         record_id\ttext\tRecord ID\t\n\
         msoc_bas_46\tradio\tHousehold size\t1, One | 2, Two | 3, Three or more\n\
         age\ttext\tAge in years\t\n",
    );
    project.write_records(
        "english",
        "record_id\tmsoc_bas_46\tage\teng_complete\n1\t1\t1\t2\n2\t1\t2\t2\n3\t2\t3\t2\n",
    );
    project.write_records(
        "spanish",
        "record_id\tmsoc_bas_46\tage\tspa_complete\n4\t2\t4\t2\n5\t3\t5\t2\n6\t3\t6\t2\n",
    );
    project.write_column_config(COLUMN_CONFIG);
    project.write_domain_map("domain\titem\tcolumn_name\nHousehold\tSize and age\tmsoc_bas_46, age\n");
    project
}

#[tokio::test]
async fn test_report_covers_every_item_and_scope() -> survey_harmonizer::Result<()> {
    let project = three_cohort_project();
    run_pull(&project.config).await?;

    let path = run_report(&project.config, &ReportOptions::default())?;
    let html = project.read(&path).unwrap_or_default();

    assert!(html.contains("<h2>Domain: Household</h2>"));
    assert!(html.contains("<h2>Domain: Demographics</h2>"));
    assert!(html.contains("<h3>Item: Age and colours</h3>"));
    // Two items, each with All Cohorts plus three surveys
    assert_eq!(html.matches("onclick=\"showCohort").count(), 8);
    assert!(html.contains(">All Cohorts</div>"));

    assert!(html.contains("<li>One: 3</li>"));
    assert!(html.contains("<li>Red: 3</li>"));
    assert!(html.contains("<li>count: 6</li>"));
    assert!(html.contains("<svg"));
    Ok(())
}

#[tokio::test]
async fn test_report_options_change_presentation() -> survey_harmonizer::Result<()> {
    let project = three_cohort_project();
    run_pull(&project.config).await?;

    let options = ReportOptions {
        title: "Survey <Pilot>".to_string(),
        chart_mode: ChartMode::None,
        axis_scale: AxisScale::Global,
        comparisons: ComparisonMode::Pairwise,
    };
    let path = run_report(&project.config, &options)?;
    let html = project.read(&path).unwrap_or_default();

    assert!(html.contains("<title>Survey &lt;Pilot&gt;</title>"));
    assert!(!html.contains("<svg"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_domain_field_fails_loudly() -> survey_harmonizer::Result<()> {
    let project = three_cohort_project();
    run_pull(&project.config).await?;
    project.write_domain_map("domain\titem\tcolumn_name\nHousehold\tSize\tmsoc_bas_99\n");

    let err = run_report(&project.config, &ReportOptions::default()).unwrap_err();

    assert!(matches!(err, PipelineError::UnknownField(name) if name == "msoc_bas_99"));
    assert!(!project.config.report_path().exists());
    Ok(())
}

#[tokio::test]
async fn test_pairwise_comparisons_report_p_values() -> survey_harmonizer::Result<()> {
    let project = two_cohort_project();
    run_pull(&project.config).await?;

    let path = run_report(&project.config, &ReportOptions::default())?;
    let html = project.read(&path).unwrap_or_default();

    assert!(html.contains("<th>english vs spanish</th>"));
    // Codes 1,1,2 against 2,3,3: every expected count is 1, p = exp(-2)
    assert!(html.contains("<tr><td>msoc_bas_46</td><td>Chi-square p = 0.1353</td></tr>"));
    // Ages 1,2,3 against 4,5,6 with pooled variance
    assert!(html.contains("<tr><td>age</td><td>T-test p = 0.0213</td></tr>"));
    Ok(())
}

#[tokio::test]
async fn test_comparisons_can_be_switched_off() -> survey_harmonizer::Result<()> {
    let project = two_cohort_project();
    run_pull(&project.config).await?;

    let options = ReportOptions {
        comparisons: ComparisonMode::None,
        ..ReportOptions::default()
    };
    let path = run_report(&project.config, &options)?;
    let html = project.read(&path).unwrap_or_default();

    assert!(!html.contains("Pairwise Comparisons"));
    assert!(!html.contains("p = "));
    assert!(html.contains("<h3>Item: Size and age</h3>"));
    Ok(())
}
