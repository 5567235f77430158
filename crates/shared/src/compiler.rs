//! Turns an ordered list of field drafts into a validated [`FormSchema`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{user_data_table_name, FieldDefinition, FieldId, FieldType, FormId, FormSchema};

pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Columns every provisioned table carries regardless of the form's fields.
pub const RESERVED_COLUMNS: [&str; 2] = ["id", "submitted_at"];

/// One field as the editor (or an API caller) describes it, before names and
/// sort order are settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub configuration: Value,
}

impl FieldDraft {
    pub fn new(field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            name: None,
            label: label.into(),
            field_type,
            is_required: false,
            configuration: Value::Null,
        }
    }

    pub fn required(mut self, is_required: bool) -> Self {
        self.is_required = is_required;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_configuration(mut self, configuration: Value) -> Self {
        self.configuration = configuration;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid form name '{name}': {reason}")]
    InvalidFormName { name: String, reason: &'static str },
    #[error("display name must not be empty")]
    EmptyDisplayName,
    #[error("field at position {index} has an empty label")]
    EmptyLabel { index: usize },
    #[error("invalid field name '{name}': {reason}")]
    InvalidFieldName { name: String, reason: &'static str },
    #[error("field name '{name}' is reserved")]
    ReservedFieldName { name: String },
    #[error("duplicate field name '{name}'")]
    DuplicateFieldName { name: String },
    #[error("invalid configuration for field '{name}': {reason}")]
    InvalidConfiguration { name: String, reason: &'static str },
}

/// Checks the storage-safe identifier grammar: ASCII letters, digits and
/// underscore, not starting with a digit.
pub fn check_identifier(name: &str) -> Result<(), &'static str> {
    let Some(first) = name.chars().next() else {
        return Err("must not be empty");
    };
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err("must be at most 64 characters");
    }
    if first.is_ascii_digit() {
        return Err("must not start with a digit");
    }
    if !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err("may only contain letters, digits and underscore");
    }
    Ok(())
}

pub fn compile(
    drafts: &[FieldDraft],
    form_name: &str,
    display_name: &str,
    description: Option<&str>,
) -> Result<FormSchema, ValidationError> {
    check_identifier(form_name).map_err(|reason| ValidationError::InvalidFormName {
        name: form_name.to_string(),
        reason,
    })?;
    let display_name = display_name.trim();
    if display_name.is_empty() {
        return Err(ValidationError::EmptyDisplayName);
    }

    let names = assign_field_names(drafts)?;

    let mut fields = Vec::with_capacity(drafts.len());
    for (index, (draft, name)) in drafts.iter().zip(names).enumerate() {
        if draft.label.trim().is_empty() {
            return Err(ValidationError::EmptyLabel { index });
        }
        check_configuration(draft, &name)?;
        fields.push(FieldDefinition {
            id: FieldId::new(),
            name,
            label: draft.label.trim().to_string(),
            field_type: draft.field_type,
            is_required: draft.is_required,
            sort_order: index as i32,
            configuration: draft.configuration.clone(),
        });
    }

    Ok(FormSchema {
        id: FormId::new(),
        name: form_name.to_string(),
        display_name: display_name.to_string(),
        description: description
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        user_data_table_name: user_data_table_name(form_name),
        fields,
    })
}

fn assign_field_names(drafts: &[FieldDraft]) -> Result<Vec<String>, ValidationError> {
    // SQLite compares identifiers case-insensitively, so uniqueness is checked on lowercase keys.
    let mut taken: HashSet<String> = RESERVED_COLUMNS.iter().map(|s| s.to_string()).collect();

    for name in drafts.iter().filter_map(|draft| draft.name.as_deref()) {
        check_identifier(name).map_err(|reason| ValidationError::InvalidFieldName {
            name: name.to_string(),
            reason,
        })?;
        let key = name.to_ascii_lowercase();
        if RESERVED_COLUMNS.contains(&key.as_str()) {
            return Err(ValidationError::ReservedFieldName {
                name: name.to_string(),
            });
        }
        if !taken.insert(key) {
            return Err(ValidationError::DuplicateFieldName {
                name: name.to_string(),
            });
        }
    }

    let mut names = Vec::with_capacity(drafts.len());
    for draft in drafts {
        if let Some(name) = &draft.name {
            names.push(name.clone());
            continue;
        }
        let base = derive_base_name(&draft.label, draft.field_type);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while taken.contains(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        taken.insert(candidate.clone());
        names.push(candidate);
    }
    Ok(names)
}

fn derive_base_name(label: &str, field_type: FieldType) -> String {
    let mut out = String::new();
    let mut pending_separator = false;
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    // leave room for a collision suffix
    out.truncate(MAX_IDENTIFIER_LEN - 8);
    let out = out.trim_end_matches('_').to_string();

    if out.is_empty() {
        field_type.slug().to_string()
    } else if out.starts_with(|ch: char| ch.is_ascii_digit()) {
        format!("{}_{out}", field_type.slug())
    } else {
        out
    }
}

fn check_configuration(draft: &FieldDraft, name: &str) -> Result<(), ValidationError> {
    let invalid = |reason| ValidationError::InvalidConfiguration {
        name: name.to_string(),
        reason,
    };

    if !(draft.configuration.is_null() || draft.configuration.is_object()) {
        return Err(invalid("configuration must be an object"));
    }
    if draft.field_type != FieldType::Dropdown {
        return Ok(());
    }

    let options = draft
        .configuration
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("dropdown requires an options list"))?;
    if options.is_empty() {
        return Err(invalid("dropdown requires at least one option"));
    }
    if !options
        .iter()
        .all(|option| option.as_str().is_some_and(|text| !text.trim().is_empty()))
    {
        return Err(invalid("dropdown options must be non-empty strings"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/compiler_tests.rs"]
mod tests;
