//! Domain map: which survey fields make up each reported item.

use std::path::Path;

use serde::Deserialize;

use crate::dictionary::DataDictionary;
use crate::error::{PipelineError, Result};
use crate::table::read_tsv;

const REQUIRED_COLUMNS: [&str; 3] = ["domain", "item", "column_name"];

#[derive(Debug, Clone, Default, Deserialize)]
struct DomainMapRow {
    domain: Option<String>,
    item: Option<String>,
    column_name: Option<String>,
}

/// One reported item and the logical fields behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainItem {
    pub domain: String,
    pub item: String,
    pub fields: Vec<String>,
}

/// Split a comma-separated field list
#[must_use]
pub fn parse_field_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read `reference/domain_map.tsv`
pub fn load_domain_map(path: &Path) -> Result<Vec<DomainItem>> {
    let batch = read_tsv(path)?;
    let schema = batch.schema();
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|name| schema.index_of(name).is_err())
    {
        return Err(PipelineError::Config(format!(
            "domain map {} lacks column '{missing}'",
            path.display()
        )));
    }

    let rows: Vec<DomainMapRow> = serde_arrow::from_record_batch(&batch)?;
    let items = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let fields = parse_field_list(row.column_name.as_deref().unwrap_or_default());
            if fields.is_empty() {
                log::warn!("Domain map row {} lists no fields, skipping", index + 1);
                return None;
            }
            Some(DomainItem {
                domain: row.domain.unwrap_or_default().trim().to_string(),
                item: row.item.unwrap_or_default().trim().to_string(),
                fields,
            })
        })
        .collect::<Vec<_>>();

    log::info!("Loaded {} domain map items from {}", items.len(), path.display());
    Ok(items)
}

/// Every field a domain item references must be in the dictionary
pub fn check_fields(items: &[DomainItem], dictionary: &DataDictionary) -> Result<()> {
    items
        .iter()
        .flat_map(|item| &item.fields)
        .try_for_each(|field| dictionary.entry(field).map(|_| ()))
}
