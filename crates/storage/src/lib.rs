use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use provisioning::{
    CellValue, ColumnDef, ColumnRole, EngineError, MetadataError, MetadataStore, StorageEngine,
};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, warn};

use shared::domain::{FieldDefinition, FieldId, FieldType, FormId, FormSchema, FormSummary};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Number of submissions stored in a provisioned table.
    pub async fn count_rows(&self, table_name: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {}",
            quote_ident(table_name)
        ))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to count rows of '{table_name}'"))?;
        Ok(count)
    }

    /// Declared column names and types of a table, in table order.
    pub async fn table_columns(&self, table_name: &str) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(table_name)))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to inspect schema of '{table_name}'"))?;
        rows.into_iter()
            .map(|row| -> Result<(String, String)> {
                Ok((row.try_get("name")?, row.try_get("type")?))
            })
            .collect()
    }

    async fn load_fields(&self, form_id: FormId) -> Result<Vec<FieldDefinition>> {
        let rows = sqlx::query(
            "SELECT id, name, label, field_type, is_required, sort_order, configuration_json
             FROM field_definitions
             WHERE form_id = ?
             ORDER BY sort_order ASC",
        )
        .bind(form_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<FieldDefinition> {
                let configuration = match row.get::<Option<String>, _>(6) {
                    Some(raw) => serde_json::from_str(&raw)
                        .context("stored field configuration is not valid json")?,
                    None => Value::Null,
                };
                Ok(FieldDefinition {
                    id: FieldId::from_str(&row.get::<String, _>(0))?,
                    name: row.get::<String, _>(1),
                    label: row.get::<String, _>(2),
                    field_type: FieldType::from_str(&row.get::<String, _>(3))?,
                    is_required: row.get::<bool, _>(4),
                    sort_order: row.get::<i32, _>(5),
                    configuration,
                })
            })
            .collect()
    }

    async fn load_form(&self, row: Option<SqliteRow>) -> Result<Option<FormSchema>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let id = FormId::from_str(&row.get::<String, _>(0))?;
        let fields = self.load_fields(id).await?;
        Ok(Some(FormSchema {
            id,
            name: row.get::<String, _>(1),
            display_name: row.get::<String, _>(2),
            description: row.get::<Option<String>, _>(3),
            user_data_table_name: row.get::<String, _>(4),
            fields,
        }))
    }

    async fn insert_form(&self, schema: &FormSchema) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO form_definitions (id, name, display_name, description, user_data_table_name)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(schema.id.to_string())
        .bind(&schema.name)
        .bind(&schema.display_name)
        .bind(schema.description.as_deref())
        .bind(&schema.user_data_table_name)
        .execute(&mut *tx)
        .await?;

        for field in &schema.fields {
            let configuration =
                (!field.configuration.is_null()).then(|| field.configuration.to_string());
            sqlx::query(
                "INSERT INTO field_definitions
                    (id, form_id, name, label, field_type, is_required, sort_order, configuration_json)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(field.id.to_string())
            .bind(schema.id.to_string())
            .bind(&field.name)
            .bind(&field.label)
            .bind(field.field_type.as_str())
            .bind(field.is_required)
            .bind(field.sort_order)
            .bind(configuration)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn create_owned_table(
        &self,
        table_name: &str,
        columns: &[ColumnDef],
        owner: FormId,
    ) -> Result<(), sqlx::Error> {
        let ddl = create_table_sql(table_name, columns);
        debug!(%table_name, %ddl, "creating user data table");

        let mut tx = self.pool.begin().await?;
        sqlx::query(&ddl).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO form_tables (table_name, form_id) VALUES (?, ?)")
            .bind(table_name)
            .bind(owner.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }
}

#[async_trait]
impl MetadataStore for Storage {
    async fn add_form_definition(&self, schema: &FormSchema) -> Result<FormId, MetadataError> {
        match self.insert_form(schema).await {
            Ok(()) => Ok(schema.id),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(MetadataError::NameTaken(schema.name.clone()))
            }
            Err(err) => Err(MetadataError::Unavailable(err.to_string())),
        }
    }

    async fn remove_form_definition(&self, id: FormId) -> Result<(), MetadataError> {
        let removed = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM field_definitions WHERE form_id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
            let removed = sqlx::query("DELETE FROM form_definitions WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?
                .rows_affected();
            tx.commit().await?;
            Ok::<_, sqlx::Error>(removed)
        }
        .await
        .map_err(|err| MetadataError::Unavailable(err.to_string()))?;

        if removed == 0 {
            warn!(form_id = %id, "no form metadata to remove");
        }
        Ok(())
    }

    async fn get_form_by_name(&self, name: &str) -> Result<Option<FormSchema>, MetadataError> {
        let row = sqlx::query(
            "SELECT id, name, display_name, description, user_data_table_name
             FROM form_definitions
             WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| MetadataError::Unavailable(err.to_string()))?;
        self.load_form(row).await.map_err(metadata_unavailable)
    }

    async fn get_form_by_id(&self, id: FormId) -> Result<Option<FormSchema>, MetadataError> {
        let row = sqlx::query(
            "SELECT id, name, display_name, description, user_data_table_name
             FROM form_definitions
             WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| MetadataError::Unavailable(err.to_string()))?;
        self.load_form(row).await.map_err(metadata_unavailable)
    }

    async fn list_forms(&self) -> Result<Vec<FormSummary>, MetadataError> {
        let rows = sqlx::query(
            "SELECT f.id, f.name, f.display_name, f.user_data_table_name, COUNT(fd.id)
             FROM form_definitions f
             LEFT JOIN field_definitions fd ON fd.form_id = f.id
             GROUP BY f.id
             ORDER BY lower(f.name) ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| MetadataError::Unavailable(err.to_string()))?;

        rows.into_iter()
            .map(|r| -> Result<FormSummary, MetadataError> {
                Ok(FormSummary {
                    id: FormId::from_str(&r.get::<String, _>(0))
                        .map_err(|err| MetadataError::Unavailable(err.to_string()))?,
                    name: r.get::<String, _>(1),
                    display_name: r.get::<String, _>(2),
                    user_data_table_name: r.get::<String, _>(3),
                    field_count: r.get::<i64, _>(4) as usize,
                })
            })
            .collect()
    }
}

#[async_trait]
impl StorageEngine for Storage {
    async fn create_table(
        &self,
        table_name: &str,
        columns: &[ColumnDef],
        owner: FormId,
    ) -> Result<(), EngineError> {
        match self.create_owned_table(table_name, columns, owner).await {
            Ok(()) => Ok(()),
            Err(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation() || db_err.message().contains("already exists") =>
            {
                Err(EngineError::TableExists(table_name.to_string()))
            }
            Err(err) => Err(EngineError::Unavailable(err.to_string())),
        }
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool, EngineError> {
        let row = sqlx::query(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND lower(name) = lower(?)",
        )
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| EngineError::Unavailable(err.to_string()))?;
        Ok(row.is_some())
    }

    async fn table_owner(&self, table_name: &str) -> Result<Option<FormId>, EngineError> {
        let row = sqlx::query("SELECT form_id FROM form_tables WHERE table_name = ?")
            .bind(table_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| EngineError::Unavailable(err.to_string()))?;
        row.map(|r| FormId::from_str(&r.get::<String, _>(0)))
            .transpose()
            .map_err(|err| EngineError::Unavailable(format!("corrupt table owner: {err}")))
    }

    async fn insert_row(
        &self,
        table_name: &str,
        values: &[(String, CellValue)],
        submitted_at: DateTime<Utc>,
    ) -> Result<i64, EngineError> {
        let sql = insert_row_sql(table_name, values.iter().map(|(name, _)| name.as_str()));
        let mut query = sqlx::query(&sql);
        for (_, value) in values {
            query = match value {
                CellValue::Null => query.bind(None::<String>),
                CellValue::Text(text) => query.bind(text.clone()),
                CellValue::Number(number) => query.bind(*number),
                CellValue::Bool(flag) => query.bind(*flag),
            };
        }
        let row = query
            .bind(submitted_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| EngineError::Unavailable(err.to_string()))?;
        Ok(row.get::<i64, _>(0))
    }
}

fn metadata_unavailable(err: anyhow::Error) -> MetadataError {
    MetadataError::Unavailable(format!("{err:#}"))
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_sql(column: &ColumnDef) -> String {
    let name = quote_ident(&column.name);
    match column.role {
        ColumnRole::PrimaryKey => format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"),
        ColumnRole::SubmittedAt => format!("{name} TEXT NOT NULL"),
        ColumnRole::Field(kind) if column.not_null => format!("{name} {} NOT NULL", kind.sql_type()),
        ColumnRole::Field(kind) => format!("{name} {}", kind.sql_type()),
    }
}

fn create_table_sql(table_name: &str, columns: &[ColumnDef]) -> String {
    let columns: Vec<String> = columns.iter().map(column_sql).collect();
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(table_name),
        columns.join(", ")
    )
}

fn insert_row_sql<'a>(table_name: &str, columns: impl Iterator<Item = &'a str>) -> String {
    let mut names: Vec<String> = columns.map(quote_ident).collect();
    names.push(quote_ident(provisioning::SUBMITTED_AT_COLUMN));
    let placeholders = vec!["?"; names.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quote_ident(table_name),
        names.join(", "),
        placeholders,
        quote_ident(provisioning::PRIMARY_KEY_COLUMN)
    )
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
