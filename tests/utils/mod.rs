use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use survey_harmonizer::{CohortSpec, PipelineConfig};
use tempfile::TempDir;

/// Authoritative metadata export of the three-cohort fixture
pub const ENGLISH_METADATA: &str = "\
field_name\tfield_type\tfield_label\tselect_choices_or_calculations
record_id\ttext\tRecord ID\t
msoc_bas_46\tradio\t<b>Household</b> size\t1, One | 2, Two | 3, Three or more
age\ttext\tAge in years\t
nickname\ttext\tNickname\t
color\tcheckbox\tFavourite <i>colours</i>\t1, Red | 2, Blue
";

pub const ENGLISH_RECORDS: &str = "\
record_id\tmsoc_bas_46\tage\tnickname\tcolor_1\tcolor_2\tmac_sdoh_questionnaire_english_complete
101\t1\t34\tAl\t1\t0\t2
102\t3\t\tBea\t0\t1\t2
";

pub const SPANISH_RECORDS: &str = "\
record_id\tmsoc_bas_45\tage\tnickname\tcolor_1\tcolor_2\tmac_sdoh_questionnaire_spanish_complete
201\t2\t28\tCarlos\t1\t1\t2
202\t1\t51\t\t0\t0\t0
";

pub const CHINESE_RECORDS: &str = "\
record_id\tmsoc_bas__46\tage\tnickname\tcolor_1\tcolor_2\tmac_sdoh_questionnaire_chinese_complete
301\t3\t45\tMei\t0\t1\t2
302\t2\t19\tLi\t1\t0\t2
303\t1\t62\tWen\t\t\t1
";

pub const COLUMN_CONFIG: &str = r#"{
  "omit": ["internal_*"],
  "non_standard_exploding": {}
}"#;

pub const DOMAIN_MAP: &str = "\
domain\titem\tcolumn_name
Household\tSize\tmsoc_bas_46
Demographics\tAge and colours\tage, color
";

/// A scratch project root with `data/` and `reference/` underneath
pub struct TestProject {
    pub dir: TempDir,
    pub config: PipelineConfig,
}

impl TestProject {
    /// Empty project with the given cohorts as `(key, survey, complete column)`
    #[must_use]
    pub fn new(cohorts: &[(&str, &str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = PipelineConfig::with_root(dir.path());
        config.cohorts = cohorts
            .iter()
            .map(|(key, survey, complete)| CohortSpec::new(*key, *survey, *complete))
            .collect();
        Self { dir, config }
    }

    pub fn write_records(&self, cohort: &str, content: &str) {
        write_file(&self.config.records_path(cohort), content);
    }

    pub fn write_metadata(&self, cohort: &str, content: &str) {
        write_file(&self.config.metadata_path(cohort), content);
    }

    pub fn write_column_config(&self, content: &str) {
        write_file(&self.config.column_config_path(), content);
    }

    pub fn write_domain_map(&self, content: &str) {
        write_file(&self.config.domain_map_path(), content);
    }

    /// Contents of a file, or `None` if it does not exist
    #[must_use]
    pub fn read(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }
}

/// English, Spanish and Chinese cohorts with cached exports and curated config
#[must_use]
pub fn three_cohort_project() -> TestProject {
    let project = TestProject::new(&[
        ("english", "english", "mac_sdoh_questionnaire_english_complete"),
        ("spanish", "spanish", "mac_sdoh_questionnaire_spanish_complete"),
        ("chinese", "chinese", "mac_sdoh_questionnaire_chinese_complete"),
    ]);
    project.write_records("english", ENGLISH_RECORDS);
    project.write_records("spanish", SPANISH_RECORDS);
    project.write_records("chinese", CHINESE_RECORDS);
    project.write_metadata("english", ENGLISH_METADATA);
    project.write_column_config(COLUMN_CONFIG);
    project.write_domain_map(DOMAIN_MAP);
    project
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent directory");
    }
    std::fs::write(path, content).expect("write fixture");
}

/// In-memory text table; `None` cells are missing values
#[must_use]
pub fn text_batch(columns: &[(&str, Vec<Option<&str>>)]) -> RecordBatch {
    let schema = Schema::new(
        columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );
    let arrays = columns
        .iter()
        .map(|(_, values)| Arc::new(StringArray::from(values.clone())) as ArrayRef)
        .collect();
    RecordBatch::try_new(Arc::new(schema), arrays).expect("valid test batch")
}

/// Column names of a batch, in order
#[must_use]
pub fn names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect()
}

/// Text values of one column
#[must_use]
pub fn text_values(batch: &RecordBatch, column: &str) -> Vec<Option<String>> {
    let array = batch
        .column_by_name(column)
        .and_then(|array| array.as_any().downcast_ref::<StringArray>())
        .expect("text column");
    array.iter().map(|value| value.map(str::to_string)).collect()
}
