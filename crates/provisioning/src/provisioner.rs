use shared::{
    catalog::{self, ColumnKind},
    domain::{FormId, FormSchema},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::{EngineError, StorageEngine};

pub const PRIMARY_KEY_COLUMN: &str = "id";
pub const SUBMITTED_AT_COLUMN: &str = "submitted_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    PrimaryKey,
    Field(ColumnKind),
    SubmittedAt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub role: ColumnRole,
    pub not_null: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("table '{table}' already exists and is not owned by form {form_id}")]
    TableAlreadyExists {
        table: String,
        form_id: FormId,
        owner: Option<FormId>,
    },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl ProvisionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProvisionError::StorageUnavailable(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyProvisioned,
}

/// Column layout of the table backing `schema`: primary key, one column per
/// field in sort order, then the submission timestamp.
pub fn table_layout(schema: &FormSchema) -> TableLayout {
    let mut columns = Vec::with_capacity(schema.fields.len() + 2);
    columns.push(ColumnDef {
        name: PRIMARY_KEY_COLUMN.to_string(),
        role: ColumnRole::PrimaryKey,
        not_null: true,
    });

    let mut fields: Vec<_> = schema.fields.iter().collect();
    fields.sort_by_key(|field| field.sort_order);
    columns.extend(fields.into_iter().map(|field| ColumnDef {
        name: field.name.clone(),
        role: ColumnRole::Field(catalog::resolve(field.field_type).column_kind),
        not_null: field.is_required,
    }));

    columns.push(ColumnDef {
        name: SUBMITTED_AT_COLUMN.to_string(),
        role: ColumnRole::SubmittedAt,
        not_null: true,
    });

    TableLayout {
        table_name: schema.user_data_table_name.clone(),
        columns,
    }
}

pub struct TableProvisioner<E: StorageEngine> {
    engine: E,
}

impl<E: StorageEngine> TableProvisioner<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Creates the table for `schema`. Calling it again for a schema whose
    /// table already belongs to it succeeds without touching storage.
    pub async fn provision(&self, schema: &FormSchema) -> Result<ProvisionOutcome, ProvisionError> {
        let layout = table_layout(schema);
        let table = layout.table_name.as_str();

        match self.engine.table_owner(table).await.map_err(unavailable)? {
            Some(owner) if owner == schema.id => {
                info!(%table, form_id = %schema.id, "table already provisioned for form");
                return Ok(ProvisionOutcome::AlreadyProvisioned);
            }
            Some(owner) => {
                warn!(%table, form_id = %schema.id, %owner, "table belongs to another form");
                return Err(ProvisionError::TableAlreadyExists {
                    table: table.to_string(),
                    form_id: schema.id,
                    owner: Some(owner),
                });
            }
            None => {}
        }

        if self.engine.table_exists(table).await.map_err(unavailable)? {
            warn!(%table, form_id = %schema.id, "table exists without an owning form");
            return Err(ProvisionError::TableAlreadyExists {
                table: table.to_string(),
                form_id: schema.id,
                owner: None,
            });
        }

        match self.engine.create_table(table, &layout.columns, schema.id).await {
            Ok(()) => {
                info!(
                    %table,
                    form_id = %schema.id,
                    columns = layout.columns.len(),
                    "provisioned user data table"
                );
                Ok(ProvisionOutcome::Created)
            }
            Err(EngineError::TableExists(table)) => {
                // lost a race; the winner may have been an earlier attempt for this same form
                let owner = self.engine.table_owner(&table).await.map_err(unavailable)?;
                if owner == Some(schema.id) {
                    return Ok(ProvisionOutcome::AlreadyProvisioned);
                }
                Err(ProvisionError::TableAlreadyExists {
                    table,
                    form_id: schema.id,
                    owner,
                })
            }
            Err(err) => Err(unavailable(err)),
        }
    }
}

fn unavailable(err: EngineError) -> ProvisionError {
    ProvisionError::StorageUnavailable(err.to_string())
}

#[cfg(test)]
#[path = "tests/provisioner_tests.rs"]
mod tests;
