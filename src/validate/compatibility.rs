//! Compatibility between declared field types and observed column types.

use std::fmt;

use crate::metadata::FieldType;
use crate::table::ObservedType;

/// Kind of column a declared field type calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedKind {
    /// Choice codes: integers, booleans or short code strings
    Categorical,
    Text,
    Numeric,
    Boolean,
    Date,
    /// Field types with no constraint on their values
    Any,
}

impl ExpectedKind {
    #[must_use]
    pub const fn for_field_type(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Radio | FieldType::Dropdown | FieldType::Checkbox => Self::Categorical,
            FieldType::Text | FieldType::Notes => Self::Text,
            FieldType::Number | FieldType::Calc | FieldType::Numeric | FieldType::Slider => {
                Self::Numeric
            }
            FieldType::YesNo | FieldType::TrueFalse => Self::Boolean,
            FieldType::DateYmd => Self::Date,
            FieldType::Descriptive | FieldType::File | FieldType::Other(_) => Self::Any,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Categorical => "categorical",
            Self::Text => "string",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for ExpectedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types of data type compatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCompatibility {
    /// The observed type is the one the declaration calls for
    Exact,
    /// The observed values fit the declaration
    Compatible,
    /// The observed values cannot hold the declared type
    Incompatible,
}

impl TypeCompatibility {
    #[must_use]
    pub const fn is_compatible(self) -> bool {
        !matches!(self, Self::Incompatible)
    }
}

/// Check an observed column type against what its declared type calls for
///
/// An empty column fits every declaration.
#[must_use]
pub const fn check_type_compatibility(
    observed: ObservedType,
    expected: ExpectedKind,
) -> TypeCompatibility {
    match (expected, observed) {
        (_, ObservedType::Empty) | (ExpectedKind::Any, _) => TypeCompatibility::Compatible,

        // Choice codes
        (ExpectedKind::Categorical, ObservedType::Integer | ObservedType::Boolean) => {
            TypeCompatibility::Exact
        }
        (ExpectedKind::Categorical, ObservedType::Float | ObservedType::Text) => {
            TypeCompatibility::Compatible
        }

        // Free text
        (ExpectedKind::Text, ObservedType::Text) => TypeCompatibility::Exact,
        (ExpectedKind::Text, ObservedType::Date) => TypeCompatibility::Compatible,

        // Numbers
        (ExpectedKind::Numeric, ObservedType::Float | ObservedType::Integer) => {
            TypeCompatibility::Exact
        }
        (ExpectedKind::Numeric, ObservedType::Boolean) => TypeCompatibility::Compatible,

        (ExpectedKind::Boolean, ObservedType::Boolean)
        | (ExpectedKind::Date, ObservedType::Date) => TypeCompatibility::Exact,

        // Default - Incompatible
        _ => TypeCompatibility::Incompatible,
    }
}
