//! Curated column rules: fields to omit and hand-listed exploding fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::util::safe_read_to_string;
use crate::error::{PipelineError, Result};
use crate::utils::OrderedMap;

/// Contents of `reference/column_config.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Field-name patterns kept out of the dictionary; a trailing `*` makes
    /// the pattern a prefix match, anything else must match exactly
    pub omit: Vec<String>,
    /// Logical field name -> the physical columns it is spread over
    pub non_standard_exploding: OrderedMap<Vec<String>>,
}

impl ColumnConfig {
    /// Load the curated config; a missing or malformed file halts the run
    pub fn load(path: &Path) -> Result<Self> {
        let content = safe_read_to_string(path, "curated column config")?;
        serde_json::from_str(&content).map_err(|e| {
            PipelineError::Config(format!("invalid column config {}: {e}", path.display()))
        })
    }

    /// Whether a field matches any omit pattern
    #[must_use]
    pub fn is_omitted(&self, field_name: &str) -> bool {
        self.omit.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => field_name.starts_with(prefix),
            None => field_name == pattern,
        })
    }

    /// Curated physical columns for a non-standard exploding field
    #[must_use]
    pub fn exploded_fields_for(&self, field_name: &str) -> Option<&[String]> {
        self.non_standard_exploding
            .get(field_name)
            .map(Vec::as_slice)
    }
}
