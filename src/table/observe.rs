//! Observed-type inference over column values.

use std::fmt;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::DataType;
use chrono::NaiveDate;

use crate::config::DateFormatConfig;
use crate::table::present_values;

/// What the values of a column look like, independent of what was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObservedType {
    /// No non-missing values
    Empty,
    /// Only `0`, `1`, `true`, `false`
    Boolean,
    Integer,
    Float,
    Date,
    /// Free text, or a mix of kinds
    Text,
}

impl ObservedType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Date => "date",
            Self::Text => "string",
        }
    }

    /// Boolean, integer and float columns all hold numbers
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Boolean | Self::Integer | Self::Float)
    }

    /// Whether two observations describe compatible columns
    #[must_use]
    pub fn unifies_with(self, other: Self) -> bool {
        self == other
            || self == Self::Empty
            || other == Self::Empty
            || (self.is_numeric() && other.is_numeric())
    }
}

impl fmt::Display for ObservedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpret a flag cell: `0`, `1`, `true` or `false`, any case
///
/// Shared by type inference, the checkbox shape check and the typed loader,
/// so a cell the loader accepts is never reported as malformed.
#[must_use]
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

#[must_use]
pub fn is_boolean_value(value: &str) -> bool {
    parse_flag(value).is_some()
}

/// Parses as a finite number
#[must_use]
pub fn is_numeric_value(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok_and(f64::is_finite)
}

/// Parse a date with the configured formats, first match wins
#[must_use]
pub fn parse_date(value: &str, dates: &DateFormatConfig) -> Option<NaiveDate> {
    let value = value.trim();
    dates
        .date_formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Canonical form of a choice code: whole-number floats lose their fraction
///
/// `"1.0"` and `"1"` compare equal; everything else is only trimmed.
#[must_use]
pub fn normalize_code(value: &str) -> String {
    let value = value.trim();
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 => {
            format!("{}", number as i64)
        }
        _ => value.to_string(),
    }
}

/// Infer the narrowest observed type that covers all values
pub fn observe_values<'a, I>(values: I, dates: &DateFormatConfig) -> ObservedType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut boolean = true;
    let mut integer = true;
    let mut float = true;
    let mut date = true;
    let mut any = false;

    for value in values {
        any = true;
        boolean = boolean && is_boolean_value(value);
        integer = integer && value.trim().parse::<i64>().is_ok();
        float = float && is_numeric_value(value);
        date = date && parse_date(value, dates).is_some();
        if !(boolean || integer || float || date) {
            return ObservedType::Text;
        }
    }

    if !any {
        ObservedType::Empty
    } else if boolean {
        ObservedType::Boolean
    } else if integer {
        ObservedType::Integer
    } else if float {
        ObservedType::Float
    } else if date {
        ObservedType::Date
    } else {
        ObservedType::Text
    }
}

/// Observed type of a column, typed or raw
#[must_use]
pub fn observe_column(array: &ArrayRef, dates: &DateFormatConfig) -> ObservedType {
    if array.null_count() == array.len() {
        return ObservedType::Empty;
    }

    match array.data_type() {
        DataType::Utf8 => array
            .as_any()
            .downcast_ref::<StringArray>()
            .map_or(ObservedType::Text, |strings| {
                observe_values(present_values(strings), dates)
            }),
        DataType::Boolean => ObservedType::Boolean,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => ObservedType::Integer,
        DataType::Float16 | DataType::Float32 | DataType::Float64 => ObservedType::Float,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => ObservedType::Date,
        _ => ObservedType::Text,
    }
}

/// At least one non-missing value, and every one of them is a number
#[must_use]
pub fn all_numeric(array: &StringArray) -> bool {
    let mut values = present_values(array).peekable();
    values.peek().is_some() && values.all(is_numeric_value)
}
