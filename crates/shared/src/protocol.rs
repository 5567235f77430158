use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    compiler::FieldDraft,
    domain::{FieldDefinition, FieldId, FieldType, FormId, FormSchema},
};

pub fn form_definitions_route() -> &'static str {
    "/api/formdefinitions"
}

pub fn form_data_route(form_name: &str) -> String {
    format!("/api/form-data/{form_name}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFieldRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFormRequest {
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<CreateFieldRequest>,
}

impl CreateFormRequest {
    /// Field drafts in submitted `sort_order`; ties keep their request order.
    pub fn drafts(&self) -> Vec<FieldDraft> {
        let mut ordered: Vec<&CreateFieldRequest> = self.fields.iter().collect();
        ordered.sort_by_key(|field| field.sort_order);
        ordered
            .into_iter()
            .map(|field| FieldDraft {
                name: field.name.clone(),
                label: field.label.clone(),
                field_type: field.field_type,
                is_required: field.is_required,
                configuration: field.configuration.clone().unwrap_or(Value::Null),
            })
            .collect()
    }

    pub fn from_schema(schema: &FormSchema) -> Self {
        Self {
            name: schema.name.clone(),
            display_name: schema.display_name.clone(),
            description: schema.description.clone(),
            fields: schema
                .fields
                .iter()
                .map(|field| CreateFieldRequest {
                    name: Some(field.name.clone()),
                    label: field.label.clone(),
                    field_type: field.field_type,
                    is_required: field.is_required,
                    sort_order: field.sort_order,
                    configuration: (!field.configuration.is_null())
                        .then(|| field.configuration.clone()),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinitionResponse {
    pub id: FieldId,
    pub name: String,
    pub label: String,
    pub field_type: FieldType,
    pub is_required: bool,
    pub sort_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinitionResponse {
    pub id: FormId,
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub user_data_table_name: String,
    pub fields: Vec<FieldDefinitionResponse>,
}

impl From<FormSchema> for FormDefinitionResponse {
    fn from(schema: FormSchema) -> Self {
        Self {
            id: schema.id,
            name: schema.name,
            display_name: schema.display_name,
            description: schema.description,
            user_data_table_name: schema.user_data_table_name,
            fields: schema
                .fields
                .into_iter()
                .map(FieldDefinitionResponse::from)
                .collect(),
        }
    }
}

impl From<FieldDefinition> for FieldDefinitionResponse {
    fn from(field: FieldDefinition) -> Self {
        Self {
            id: field.id,
            name: field.name,
            label: field.label,
            field_type: field.field_type,
            is_required: field.is_required,
            sort_order: field.sort_order,
            configuration: (!field.configuration.is_null()).then_some(field.configuration),
        }
    }
}

/// Values keyed by field name, as posted to the form-data route.
pub type FormDataPayload = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub form_name: String,
    pub row_id: i64,
    pub submitted_at: DateTime<Utc>,
}
