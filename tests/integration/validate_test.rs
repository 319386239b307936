use std::collections::BTreeSet;

use survey_harmonizer::config::DateFormatConfig;
use survey_harmonizer::metadata::{MetadataRow, normalize_rows};
use survey_harmonizer::table::ObservedType;
use survey_harmonizer::utils::OrderedMap;
use survey_harmonizer::validate::{FindingCategory, MissingKind};
use survey_harmonizer::{ColumnConfig, Finding, build_dictionary, validate};

use crate::utils::text_batch;

fn row(name: &str, field_type: &str, choices: Option<&str>) -> MetadataRow {
    MetadataRow {
        field_name: Some(name.to_string()),
        field_type: Some(field_type.to_string()),
        field_label: Some(name.to_string()),
        select_choices_or_calculations: choices.map(str::to_string),
    }
}

#[test]
fn test_every_check_reports_its_findings() -> survey_harmonizer::Result<()> {
    let metadata = normalize_rows(vec![
        row("sex", "radio", Some("1, Male | 2, Female")),
        row("dob", "date_ymd", None),
        row("color", "checkbox", Some("1, Red | 2, Blue")),
        row("height", "number", None),
        row("lang", "text", None),
    ]);
    let mut non_standard_exploding = OrderedMap::new();
    non_standard_exploding.insert("lang", vec!["lang_en".to_string(), "lang_other_text".to_string()]);
    let config = ColumnConfig {
        omit: Vec::new(),
        non_standard_exploding,
    };

    let combined = text_batch(&[
        ("sex", vec![Some("1"), Some("2.0"), Some("7")]),
        ("dob", vec![Some("2020-01-02"), Some("yesterday"), None]),
        ("color_1", vec![Some("1"), Some("0"), Some("2")]),
        ("color_9", vec![Some("1"), None, None]),
        ("lang_en", vec![Some("1"), Some("0"), None]),
        ("survey", vec![Some("english"), Some("english"), Some("spanish")]),
    ]);
    let build = build_dictionary(&metadata.fields, &combined, &config);

    let report = validate(&combined, &build.dictionary, &DateFormatConfig::default())?;
    let findings = &report.findings;

    assert!(findings.contains(&Finding::ValueOutOfRange {
        field: "sex".into(),
        values: BTreeSet::from(["7".to_string()]),
    }));
    assert!(findings.iter().any(|f| matches!(
        f,
        Finding::TypeMismatch { field, observed: ObservedType::Text, .. } if field == "dob"
    )));
    assert!(findings.contains(&Finding::NonBooleanExplodedColumn {
        field: "color".into(),
        column: "color_1".into(),
        observed: ObservedType::Integer,
    }));
    assert!(findings.contains(&Finding::UnexpectedExplodedColumn {
        field: "color".into(),
        column: "color_9".into(),
    }));
    assert!(findings.contains(&Finding::MissingColumn {
        field: "color".into(),
        column: "color_2".into(),
        kind: MissingKind::Checkbox,
    }));
    assert!(findings.contains(&Finding::MissingColumn {
        field: "height".into(),
        column: "height".into(),
        kind: MissingKind::Plain,
    }));
    assert!(findings.contains(&Finding::MissingColumn {
        field: "lang".into(),
        column: "lang_other_text".into(),
        kind: MissingKind::NonStandardExploding,
    }));

    // Checked against the sex codes, whole-number floats are fine
    assert!(!findings.iter().any(|f| f.to_string().contains("2.0")));

    let grouped = report.by_category();
    assert_eq!(grouped[&FindingCategory::MissingColumns].len(), 3);
    assert_eq!(grouped[&FindingCategory::CheckboxShape].len(), 2);
    Ok(())
}

#[test]
fn test_cross_survey_drift_and_column_types() -> survey_harmonizer::Result<()> {
    let combined = text_batch(&[
        ("score", vec![Some("3"), Some("4"), Some("high")]),
        ("flag", vec![Some("1"), Some("0"), Some("12")]),
        ("notes", vec![None, None, None]),
        ("survey", vec![Some("english"), Some("english"), Some("spanish")]),
    ]);
    let build = build_dictionary(&[], &combined, &ColumnConfig::default());

    let report = validate(&combined, &build.dictionary, &DateFormatConfig::default())?;

    // Boolean-looking and integer columns both hold numbers
    assert_eq!(
        report.findings,
        vec![Finding::CohortTypeDrift {
            column: "score".into(),
            per_cohort: vec![
                ("english".into(), ObservedType::Integer),
                ("spanish".into(), ObservedType::Text),
            ],
        }]
    );
    assert_eq!(
        report.column_types,
        vec![
            ("score".to_string(), ObservedType::Text),
            ("flag".to_string(), ObservedType::Integer),
            ("notes".to_string(), ObservedType::Empty),
            ("survey".to_string(), ObservedType::Text),
        ]
    );
    Ok(())
}

#[test]
fn test_findings_never_fail_the_run() -> survey_harmonizer::Result<()> {
    let metadata = normalize_rows(vec![row("age", "number", None)]);
    let combined = text_batch(&[("age", vec![Some("old"), Some("older")])]);
    let build = build_dictionary(&metadata.fields, &combined, &ColumnConfig::default());

    let report = validate(&combined, &build.dictionary, &DateFormatConfig::default())?;
    assert!(!report.is_clean());
    assert_eq!(report.by_category().len(), 1);
    Ok(())
}
