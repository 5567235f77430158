//! The fixed set of field templates a user can drag onto the canvas.

use std::fmt;

use serde_json::{json, Value};
use shared::domain::FieldType;

/// Identifies a palette entry. There is exactly one entry per field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaletteEntryId(FieldType);

impl PaletteEntryId {
    pub fn field_type(self) -> FieldType {
        self.0
    }

    /// The stable key used by the editor, e.g. `datepicker`.
    pub fn key(self) -> &'static str {
        self.0.slug()
    }
}

impl From<FieldType> for PaletteEntryId {
    fn from(field_type: FieldType) -> Self {
        Self(field_type)
    }
}

impl fmt::Display for PaletteEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "palette:{}", self.key())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaletteEntry {
    pub id: PaletteEntryId,
    pub field_type: FieldType,
    pub default_label: &'static str,
}

impl PaletteEntry {
    pub fn default_configuration(&self) -> Value {
        default_configuration(self.field_type)
    }
}

pub fn entry(id: PaletteEntryId) -> PaletteEntry {
    let default_label = match id.field_type() {
        FieldType::TextField => "Text Field",
        FieldType::NumberField => "Number Field",
        FieldType::DatePicker => "Date Picker",
        FieldType::Checkbox => "Checkbox",
        FieldType::Dropdown => "Dropdown",
    };
    PaletteEntry {
        id,
        field_type: id.field_type(),
        default_label,
    }
}

/// All entries in display order.
pub fn entries() -> Vec<PaletteEntry> {
    FieldType::ALL
        .into_iter()
        .map(|field_type| entry(field_type.into()))
        .collect()
}

/// Looks an entry up by key (`datepicker`) or wire name (`date_picker`).
pub fn find(key: &str) -> Option<PaletteEntryId> {
    key.trim()
        .to_ascii_lowercase()
        .parse::<FieldType>()
        .ok()
        .map(PaletteEntryId::from)
}

pub fn default_configuration(field_type: FieldType) -> Value {
    match field_type {
        FieldType::Dropdown => json!({ "options": [] }),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_lists_every_field_type_once() {
        let keys: Vec<&str> = entries().iter().map(|e| e.id.key()).collect();
        assert_eq!(
            keys,
            vec!["textfield", "numberfield", "datepicker", "checkbox", "dropdown"]
        );
    }

    #[test]
    fn finds_entries_by_key_or_wire_name() {
        assert_eq!(find("datepicker"), Some(FieldType::DatePicker.into()));
        assert_eq!(find("Date_Picker"), Some(FieldType::DatePicker.into()));
        assert_eq!(find("slider"), None);
    }

    #[test]
    fn dropdown_starts_with_empty_options() {
        let dropdown = entry(FieldType::Dropdown.into());
        assert_eq!(dropdown.default_configuration(), json!({ "options": [] }));
        assert!(entry(FieldType::Checkbox.into())
            .default_configuration()
            .is_null());
    }
}
