//! Static registry of the supported field types and how each one is stored.

use serde::{Deserialize, Serialize};

use crate::domain::FieldType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Numeric,
    Date,
    Boolean,
}

impl ColumnKind {
    /// SQLite storage class used when the column is created.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Text | ColumnKind::Date => "TEXT",
            ColumnKind::Numeric => "REAL",
            ColumnKind::Boolean => "INTEGER",
        }
    }
}

/// Rule a submitted value must satisfy before it reaches the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultConstraint {
    AnyText,
    Numeric,
    CalendarDate,
    Boolean,
    OneOfOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub column_kind: ColumnKind,
    pub default_constraint: DefaultConstraint,
}

pub fn resolve(field_type: FieldType) -> ColumnSpec {
    let (column_kind, default_constraint) = match field_type {
        FieldType::TextField => (ColumnKind::Text, DefaultConstraint::AnyText),
        FieldType::NumberField => (ColumnKind::Numeric, DefaultConstraint::Numeric),
        FieldType::DatePicker => (ColumnKind::Date, DefaultConstraint::CalendarDate),
        FieldType::Checkbox => (ColumnKind::Boolean, DefaultConstraint::Boolean),
        FieldType::Dropdown => (ColumnKind::Text, DefaultConstraint::OneOfOptions),
    };
    ColumnSpec {
        column_kind,
        default_constraint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_type_resolves_to_a_column() {
        for field_type in FieldType::ALL {
            let spec = resolve(field_type);
            assert!(!spec.column_kind.sql_type().is_empty());
        }
    }

    #[test]
    fn number_field_is_numeric() {
        let spec = resolve(FieldType::NumberField);
        assert_eq!(spec.column_kind, ColumnKind::Numeric);
        assert_eq!(spec.default_constraint, DefaultConstraint::Numeric);
        assert_eq!(spec.column_kind.sql_type(), "REAL");
    }

    #[test]
    fn unknown_field_type_is_rejected_when_parsing() {
        let err = "signature_pad"
            .parse::<FieldType>()
            .expect_err("closed set");
        assert_eq!(err.0, "signature_pad");
        assert_eq!("datepicker".parse::<FieldType>(), Ok(FieldType::DatePicker));
        assert_eq!("date_picker".parse::<FieldType>(), Ok(FieldType::DatePicker));
    }
}
