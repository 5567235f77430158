use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_newtype!(FormId);
id_newtype!(FieldId);

/// Prefix of every table provisioned for a form.
pub const USER_DATA_TABLE_PREFIX: &str = "UserData_";

pub fn user_data_table_name(form_name: &str) -> String {
    format!("{USER_DATA_TABLE_PREFIX}{form_name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    TextField,
    NumberField,
    DatePicker,
    Checkbox,
    Dropdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field type '{0}'")]
pub struct UnknownFieldType(pub String);

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        FieldType::TextField,
        FieldType::NumberField,
        FieldType::DatePicker,
        FieldType::Checkbox,
        FieldType::Dropdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::TextField => "text_field",
            FieldType::NumberField => "number_field",
            FieldType::DatePicker => "date_picker",
            FieldType::Checkbox => "checkbox",
            FieldType::Dropdown => "dropdown",
        }
    }

    /// Short lowercase key used by the builder palette and by derived field names.
    pub fn slug(self) -> &'static str {
        match self {
            FieldType::TextField => "textfield",
            FieldType::NumberField => "numberfield",
            FieldType::DatePicker => "datepicker",
            FieldType::Checkbox => "checkbox",
            FieldType::Dropdown => "dropdown",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = UnknownFieldType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s || ty.slug() == s)
            .ok_or_else(|| UnknownFieldType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: FieldId,
    pub name: String,
    pub label: String,
    pub field_type: FieldType,
    pub is_required: bool,
    pub sort_order: i32,
    #[serde(default)]
    pub configuration: Value,
}

impl FieldDefinition {
    /// Options of a dropdown field; empty for every other type.
    pub fn options(&self) -> Vec<&str> {
        self.configuration
            .get("options")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub id: FormId,
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub user_data_table_name: String,
    pub fields: Vec<FieldDefinition>,
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSummary {
    pub id: FormId,
    pub name: String,
    pub display_name: String,
    pub user_data_table_name: String,
    pub field_count: usize,
}

impl From<&FormSchema> for FormSummary {
    fn from(schema: &FormSchema) -> Self {
        Self {
            id: schema.id,
            name: schema.name.clone(),
            display_name: schema.display_name.clone(),
            user_data_table_name: schema.user_data_table_name.clone(),
            field_count: schema.fields.len(),
        }
    }
}
