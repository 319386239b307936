use survey_harmonizer::{CohortSpec, PipelineError, harmonize};

use crate::utils::{names, text_batch, text_values};

fn renames() -> Vec<(String, String)> {
    vec![("msoc_bas_45".to_string(), "msoc_bas_46".to_string())]
}

/// Three cohorts differing only in the rename targets end up on one schema
#[test]
fn test_three_cohorts_share_one_schema() -> survey_harmonizer::Result<()> {
    let cohorts = vec![
        (
            CohortSpec::new("english", "english", "english_complete"),
            text_batch(&[
                ("id", vec![Some("1"), Some("2")]),
                ("msoc_bas_46", vec![Some("1"), Some("2")]),
                ("english_complete", vec![Some("2"), Some("2")]),
            ]),
        ),
        (
            CohortSpec::new("spanish", "spanish", "spanish_complete"),
            text_batch(&[
                ("id", vec![Some("3")]),
                ("msoc_bas_45", vec![Some("3")]),
                ("spanish_complete", vec![Some("0")]),
            ]),
        ),
        (
            CohortSpec::new("chinese", "chinese", "chinese__complete"),
            text_batch(&[
                ("id", vec![Some("4"), Some("5"), Some("6")]),
                ("msoc_bas__46", vec![Some("1"), None, Some("3")]),
                ("chinese__complete", vec![Some("2"), Some("1"), Some("2")]),
            ]),
        ),
    ];

    let combined = harmonize(cohorts, &renames())?;

    assert_eq!(
        names(&combined.batch),
        vec!["id", "msoc_bas_46", "questionnaire_complete", "survey"]
    );
    assert_eq!(combined.num_rows(), 2 + 1 + 3);
    assert_eq!(
        combined.row_counts,
        vec![
            ("english".to_string(), 2),
            ("spanish".to_string(), 1),
            ("chinese".to_string(), 3),
        ]
    );

    // Cohort order, then row order within each cohort
    let ids: Vec<_> = text_values(&combined.batch, "id").into_iter().flatten().collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
    assert_eq!(text_values(&combined.batch, "msoc_bas_46")[2].as_deref(), Some("3"));
    assert_eq!(text_values(&combined.batch, "msoc_bas_46")[4], None);
    Ok(())
}

#[test]
fn test_script_variants_share_a_survey_label() -> survey_harmonizer::Result<()> {
    let cohorts = vec![
        (
            CohortSpec::new("chinese_traditional", "chinese", "traditional_complete"),
            text_batch(&[("id", vec![Some("1")]), ("traditional_complete", vec![Some("2")])]),
        ),
        (
            CohortSpec::new("chinese_simplified", "chinese", "simplified_complete"),
            text_batch(&[("id", vec![Some("2")]), ("simplified_complete", vec![Some("2")])]),
        ),
    ];

    let combined = harmonize(cohorts, &[])?;

    let surveys: Vec<_> = text_values(&combined.batch, "survey").into_iter().flatten().collect();
    assert_eq!(surveys, vec!["chinese", "chinese"]);
    assert_eq!(combined.row_counts.len(), 2);
    Ok(())
}

#[test]
fn test_column_mismatch_halts_with_differences() {
    let cohorts = vec![
        (
            CohortSpec::new("english", "english", "english_complete"),
            text_batch(&[
                ("id", vec![Some("1")]),
                ("extra_en", vec![Some("x")]),
                ("english_complete", vec![Some("2")]),
            ]),
        ),
        (
            CohortSpec::new("spanish", "spanish", "spanish_complete"),
            text_batch(&[("id", vec![Some("2")]), ("spanish_complete", vec![Some("2")])]),
        ),
    ];

    let Err(PipelineError::ColumnMismatch(mismatch)) = harmonize(cohorts, &renames()) else {
        panic!("expected harmonization to halt on a column mismatch");
    };

    assert_eq!(mismatch.differences.len(), 2);
    assert_eq!(mismatch.differences[0].cohort, "english");
    assert!(mismatch.differences[0].extra.contains("extra_en"));
    assert!(mismatch.differences[1].extra.is_empty());
}

#[test]
fn test_rename_onto_an_existing_column_is_fatal() {
    let cohorts = vec![(
        CohortSpec::new("spanish", "spanish", "spanish_complete"),
        text_batch(&[
            ("msoc_bas_45", vec![Some("1")]),
            ("msoc_bas_46", vec![Some("2")]),
            ("spanish_complete", vec![Some("2")]),
        ]),
    )];

    let err = harmonize(cohorts, &renames()).unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateColumns { cohort, .. } if cohort == "spanish"));
}
