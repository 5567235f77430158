//! Checks a submitted payload against a form schema and turns it into column values.

use chrono::{DateTime, NaiveDate};
use provisioning::CellValue;
use serde_json::Value;
use shared::{
    catalog::{self, DefaultConstraint},
    domain::{FieldDefinition, FormSchema},
    protocol::FormDataPayload,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("'{0}' is not a field of this form")]
    UnknownField(String),
    #[error("field '{0}' is required")]
    MissingRequired(String),
    #[error("field '{field}' expects {expected}")]
    InvalidValue {
        field: String,
        expected: &'static str,
    },
}

pub fn validate_submission(
    schema: &FormSchema,
    payload: &FormDataPayload,
) -> Result<Vec<(String, CellValue)>, SubmissionError> {
    if let Some(unknown) = payload.keys().find(|key| schema.field(key).is_none()) {
        return Err(SubmissionError::UnknownField(unknown.clone()));
    }

    let mut fields: Vec<&FieldDefinition> = schema.fields.iter().collect();
    fields.sort_by_key(|field| field.sort_order);

    fields
        .into_iter()
        .map(|field| {
            let value = match payload.get(&field.name) {
                None | Some(Value::Null) => CellValue::Null,
                Some(Value::String(text)) if text.trim().is_empty() => CellValue::Null,
                Some(value) => coerce(field, value)?,
            };
            if field.is_required && value == CellValue::Null {
                return Err(SubmissionError::MissingRequired(field.name.clone()));
            }
            Ok((field.name.clone(), value))
        })
        .collect()
}

fn coerce(field: &FieldDefinition, value: &Value) -> Result<CellValue, SubmissionError> {
    let invalid = |expected| SubmissionError::InvalidValue {
        field: field.name.clone(),
        expected,
    };

    match catalog::resolve(field.field_type).default_constraint {
        DefaultConstraint::AnyText => value
            .as_str()
            .map(|text| CellValue::Text(text.to_string()))
            .ok_or_else(|| invalid("text")),
        DefaultConstraint::Numeric => {
            let number = match value {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse::<f64>().ok(),
                _ => None,
            };
            number
                .filter(|n| n.is_finite())
                .map(CellValue::Number)
                .ok_or_else(|| invalid("a number"))
        }
        DefaultConstraint::CalendarDate => value
            .as_str()
            .and_then(parse_date)
            .map(|date| CellValue::Text(date.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| invalid("a date (YYYY-MM-DD)")),
        DefaultConstraint::Boolean => value
            .as_bool()
            .map(CellValue::Bool)
            .ok_or_else(|| invalid("true or false")),
        DefaultConstraint::OneOfOptions => value
            .as_str()
            .filter(|choice| field.options().contains(choice))
            .map(|choice| CellValue::Text(choice.to_string()))
            .ok_or_else(|| invalid("one of the configured options")),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;
