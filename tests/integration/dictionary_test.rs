use arrow::array::{Array, BooleanArray};
use arrow::datatypes::DataType;
use survey_harmonizer::config::DateFormatConfig;
use survey_harmonizer::metadata::{MetadataRow, normalize_rows};
use survey_harmonizer::table::apply_dictionary;
use survey_harmonizer::utils::OrderedMap;
use survey_harmonizer::{ColumnConfig, DataDictionary, FieldType, build_dictionary};

use crate::utils::text_batch;

fn row(name: &str, field_type: &str, label: &str, choices: &str) -> MetadataRow {
    MetadataRow {
        field_name: Some(name.to_string()),
        field_type: Some(field_type.to_string()),
        field_label: Some(label.to_string()),
        select_choices_or_calculations: (!choices.is_empty()).then(|| choices.to_string()),
    }
}

#[test]
fn test_checkbox_round_trip() -> survey_harmonizer::Result<()> {
    let metadata = normalize_rows(vec![row("field_2", "checkbox", "Pick any", "1, Yes | 2, No")]);
    let combined = text_batch(&[
        ("field_2_1", vec![Some("1"), Some("0"), None]),
        ("field_2_2", vec![Some("0"), Some("true"), Some("false")]),
    ]);

    let build = build_dictionary(&metadata.fields, &combined, &ColumnConfig::default());
    let entry = build.dictionary.entry("field_2")?;

    assert_eq!(entry.is_checkbox, Some(true));
    assert_eq!(
        entry.exploded_fields.as_deref(),
        Some(&["field_2_1".to_string(), "field_2_2".to_string()][..])
    );

    let typed = apply_dictionary(&combined, &build.dictionary, &DateFormatConfig::default())?;
    for column in ["field_2_1", "field_2_2"] {
        let array = typed.column_by_name(column).expect("exploded column");
        assert_eq!(array.data_type(), &DataType::Boolean);
        // Every present raw value mapped onto a boolean
        let raw_present = combined.column_by_name(column).map_or(0, |a| a.len() - a.null_count());
        assert_eq!(array.len() - array.null_count(), raw_present);
    }

    let second = typed
        .column_by_name("field_2_2")
        .and_then(|a| a.as_any().downcast_ref::<BooleanArray>())
        .expect("boolean column");
    assert!(!second.value(0));
    assert!(second.value(1));
    Ok(())
}

#[test]
fn test_text_promoted_when_all_values_numeric() -> survey_harmonizer::Result<()> {
    let metadata = normalize_rows(vec![
        row("years", "text", "Years", ""),
        row("comment", "text", "Comment", ""),
        row("blank", "text", "Never answered", ""),
    ]);
    let combined = text_batch(&[
        ("years", vec![Some("12"), Some("7"), None]),
        ("comment", vec![Some("12"), Some("n/a"), None]),
        ("blank", vec![None, None, None]),
    ]);

    let build = build_dictionary(&metadata.fields, &combined, &ColumnConfig::default());

    assert_eq!(build.dictionary.entry("years")?.field_type, FieldType::Numeric);
    assert_eq!(build.dictionary.entry("comment")?.field_type, FieldType::Text);
    assert_eq!(build.dictionary.entry("blank")?.field_type, FieldType::Text);
    assert_eq!(build.promoted, vec!["years"]);
    Ok(())
}

#[test]
fn test_omitted_and_curated_exploding_fields() -> survey_harmonizer::Result<()> {
    let metadata = normalize_rows(vec![
        row("record_id", "text", "ID", ""),
        row("internal_note", "notes", "Staff note", ""),
        row("lang", "checkbox", "Languages", "1, English | 2, Other"),
    ]);
    let mut non_standard_exploding = OrderedMap::new();
    non_standard_exploding.insert("lang", vec!["lang_en".to_string(), "lang_other_text".to_string()]);
    let config = ColumnConfig {
        omit: vec!["internal_*".to_string()],
        non_standard_exploding,
    };
    let combined = text_batch(&[("record_id", vec![Some("a1")])]);

    let build = build_dictionary(&metadata.fields, &combined, &config);

    assert_eq!(build.omitted, vec!["internal_note"]);
    assert!(build.dictionary.get("internal_note").is_none());

    let lang = build.dictionary.entry("lang")?;
    assert_eq!(lang.exploding, Some(true));
    assert_eq!(lang.is_checkbox, None);
    assert_eq!(
        lang.exploded_fields.as_deref(),
        Some(&["lang_en".to_string(), "lang_other_text".to_string()][..])
    );
    // Curated lists do not stop value labels from being kept
    assert_eq!(lang.label_for("2"), "Other");
    Ok(())
}

#[test]
fn test_one_entry_per_usable_field() {
    let metadata = normalize_rows(vec![
        row("a", "text", "A", ""),
        row("a", "text", "Duplicate A", ""),
        row("", "text", "No name", ""),
        row("b", "radio", "<p>B</p>", "no comma here"),
        row("c", "yesno", "C", ""),
    ]);
    let combined = text_batch(&[("a", vec![None]), ("c", vec![Some("1")])]);

    let build = build_dictionary(&metadata.fields, &combined, &ColumnConfig::default());

    let fields: Vec<&str> = build.dictionary.iter().map(|(name, _)| name).collect();
    assert_eq!(fields, vec!["a", "c"]);
    assert_eq!(metadata.failures.len(), 3);
    assert_eq!(build.dictionary.entry("a").map(|e| e.label.as_str()).ok(), Some("A"));
}

#[test]
fn test_dictionary_json_contract() -> survey_harmonizer::Result<()> {
    let metadata = normalize_rows(vec![
        row("sex", "radio", "Sex <b>at birth</b>", "2, Female | 1, Male"),
        row("color", "checkbox", "Colour", "1, Red"),
        row("age", "number", "Age", ""),
    ]);
    let combined = text_batch(&[("age", vec![Some("40")])]);
    let build = build_dictionary(&metadata.fields, &combined, &ColumnConfig::default());

    let json = build.dictionary.to_json_string()?;
    let value: serde_json::Value = serde_json::from_str(&json)?;

    assert_eq!(value["sex"]["type"], "radio");
    assert_eq!(value["sex"]["label"], "Sex at birth");
    assert_eq!(value["age"]["value_labels"], serde_json::Value::Null);
    assert!(value["age"].get("is_checkbox").is_none());
    assert_eq!(value["color"]["is_checkbox"], true);
    assert_eq!(value["color"]["exploded_fields"][0], "color_1");

    // Keys keep metadata order, codes keep declared order
    let sex_at = json.find("\"sex\"").unwrap_or(usize::MAX);
    let age_at = json.find("\"age\"").unwrap_or(0);
    assert!(sex_at < age_at);
    assert!(json.find("\"2\": \"Female\"") < json.find("\"1\": \"Male\""));

    let reloaded: DataDictionary = serde_json::from_str(&json)?;
    assert_eq!(reloaded, build.dictionary);
    Ok(())
}
