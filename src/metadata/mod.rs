//! REDCap field metadata: field types, normalized labels and choice lists.

pub mod loader;
pub mod normalize;

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::OrderedMap;

pub use loader::{MetadataLoad, MetadataRow, load_metadata, normalize_rows};
pub use normalize::{ChoiceParse, parse_choices, strip_markup};

/// Field type as declared by REDCap, plus `numeric` for promoted text fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Notes,
    Radio,
    Dropdown,
    Checkbox,
    Number,
    Calc,
    YesNo,
    TrueFalse,
    DateYmd,
    Numeric,
    Slider,
    Descriptive,
    File,
    /// Any type this pipeline has no special handling for
    Other(String),
}

impl FieldType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Notes => "notes",
            Self::Radio => "radio",
            Self::Dropdown => "dropdown",
            Self::Checkbox => "checkbox",
            Self::Number => "number",
            Self::Calc => "calc",
            Self::YesNo => "yesno",
            Self::TrueFalse => "truefalse",
            Self::DateYmd => "date_ymd",
            Self::Numeric => "numeric",
            Self::Slider => "slider",
            Self::Descriptive => "descriptive",
            Self::File => "file",
            Self::Other(name) => name,
        }
    }

    /// Types whose metadata carries a `code, label | ...` choice list
    #[must_use]
    pub const fn has_choices(&self) -> bool {
        matches!(self, Self::Radio | Self::Dropdown | Self::Checkbox)
    }

    /// Single-answer choice types stored as one coded column
    #[must_use]
    pub const fn is_single_choice(&self) -> bool {
        matches!(self, Self::Radio | Self::Dropdown)
    }

    /// Types whose values are numbers
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Calc | Self::Numeric | Self::Slider)
    }

    /// Types stored as a 0/1 flag
    #[must_use]
    pub const fn is_flag(&self) -> bool {
        matches!(self, Self::YesNo | Self::TrueFalse)
    }
}

impl FromStr for FieldType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "text" => Self::Text,
            "notes" => Self::Notes,
            "radio" => Self::Radio,
            "dropdown" => Self::Dropdown,
            "checkbox" => Self::Checkbox,
            "number" => Self::Number,
            "calc" => Self::Calc,
            "yesno" => Self::YesNo,
            "truefalse" => Self::TrueFalse,
            "date_ymd" => Self::DateYmd,
            "numeric" => Self::Numeric,
            "slider" => Self::Slider,
            "descriptive" => Self::Descriptive,
            "file" => Self::File,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(field_type) => field_type,
            Err(never) => match never {},
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical survey field from the authoritative metadata export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    pub field_name: String,
    /// Label with markup removed
    pub field_label: String,
    pub field_type: FieldType,
    /// Ordered code -> label pairs; only for choice types
    pub select_choices: Option<OrderedMap<String>>,
}
