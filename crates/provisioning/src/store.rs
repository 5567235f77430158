use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{FormId, FormSchema, FormSummary};
use thiserror::Error;

use crate::provisioner::ColumnDef;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("form name '{0}' is already taken")]
    NameTaken(String),
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("table '{0}' already exists")]
    TableExists(String),
    #[error("storage engine unavailable: {0}")]
    Unavailable(String),
}

/// Durable store for form schema metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn add_form_definition(&self, schema: &FormSchema) -> Result<FormId, MetadataError>;
    /// Only used to compensate a failed provisioning.
    async fn remove_form_definition(&self, id: FormId) -> Result<(), MetadataError>;
    async fn get_form_by_name(&self, name: &str) -> Result<Option<FormSchema>, MetadataError>;
    async fn get_form_by_id(&self, id: FormId) -> Result<Option<FormSchema>, MetadataError>;
    async fn list_forms(&self) -> Result<Vec<FormSummary>, MetadataError>;
}

/// Physical storage holding one table per provisioned form.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Creates the table and records `owner` in the table ownership mapping,
    /// both or neither.
    async fn create_table(
        &self,
        table_name: &str,
        columns: &[ColumnDef],
        owner: FormId,
    ) -> Result<(), EngineError>;
    async fn table_exists(&self, table_name: &str) -> Result<bool, EngineError>;
    async fn table_owner(&self, table_name: &str) -> Result<Option<FormId>, EngineError>;
    async fn insert_row(
        &self,
        table_name: &str,
        values: &[(String, CellValue)],
        submitted_at: DateTime<Utc>,
    ) -> Result<i64, EngineError>;
}

/// A validated value ready to be bound into a user data column.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
}

#[async_trait]
impl<T: MetadataStore + ?Sized> MetadataStore for std::sync::Arc<T> {
    async fn add_form_definition(&self, schema: &FormSchema) -> Result<FormId, MetadataError> {
        (**self).add_form_definition(schema).await
    }

    async fn remove_form_definition(&self, id: FormId) -> Result<(), MetadataError> {
        (**self).remove_form_definition(id).await
    }

    async fn get_form_by_name(&self, name: &str) -> Result<Option<FormSchema>, MetadataError> {
        (**self).get_form_by_name(name).await
    }

    async fn get_form_by_id(&self, id: FormId) -> Result<Option<FormSchema>, MetadataError> {
        (**self).get_form_by_id(id).await
    }

    async fn list_forms(&self) -> Result<Vec<FormSummary>, MetadataError> {
        (**self).list_forms().await
    }
}

#[async_trait]
impl<T: StorageEngine + ?Sized> StorageEngine for std::sync::Arc<T> {
    async fn create_table(
        &self,
        table_name: &str,
        columns: &[ColumnDef],
        owner: FormId,
    ) -> Result<(), EngineError> {
        (**self).create_table(table_name, columns, owner).await
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool, EngineError> {
        (**self).table_exists(table_name).await
    }

    async fn table_owner(&self, table_name: &str) -> Result<Option<FormId>, EngineError> {
        (**self).table_owner(table_name).await
    }

    async fn insert_row(
        &self,
        table_name: &str,
        values: &[(String, CellValue)],
        submitted_at: DateTime<Utc>,
    ) -> Result<i64, EngineError> {
        (**self).insert_row(table_name, values, submitted_at).await
    }
}
