//! Markup stripping and choice-string parsing.

use std::sync::OnceLock;

use regex::Regex;

use crate::utils::OrderedMap;

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<]+?>").expect("markup tag regex"))
}

/// Remove every angle-bracket tag from a label
///
/// Literal tag stripping only; entities and text between tags are kept.
#[must_use]
pub fn strip_markup(text: &str) -> String {
    markup_regex().replace_all(text, "").into_owned()
}

/// Result of parsing a `code, label | code, label` choice string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceParse {
    /// Trimmed code -> trimmed, markup-stripped label, in listed order
    pub labels: OrderedMap<String>,
    /// Entries without a comma, skipped
    pub skipped: Vec<String>,
}

/// Parse a REDCap `select_choices_or_calculations` string
///
/// Entries are split on `|`, then on the first `,`. Entries without a comma
/// are skipped and returned in [`ChoiceParse::skipped`] for the caller to log.
#[must_use]
pub fn parse_choices(raw: &str) -> ChoiceParse {
    let mut parsed = ChoiceParse::default();

    for entry in raw.split('|') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(',') {
            Some((code, label)) => {
                parsed
                    .labels
                    .insert(code.trim(), strip_markup(label.trim()).trim().to_string());
            }
            None => parsed.skipped.push(entry.to_string()),
        }
    }

    parsed
}
