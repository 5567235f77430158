use std::sync::Arc;

use chrono::Utc;
use provisioning::{
    CreateFormError, EngineError, MetadataError, MetadataStore, Orchestrator, ProvisionError,
    RetryPolicy, StorageEngine,
};
use shared::{
    domain::{FormId, FormSchema, FormSummary},
    error::{ApiError, ErrorCode},
    protocol::{CreateFormRequest, FormDataPayload, FormDefinitionResponse, SubmissionReceipt},
};
use storage::Storage;
use tracing::{info, warn};

pub mod submission;

pub use submission::{validate_submission, SubmissionError};

pub type FormOrchestrator = Orchestrator<Storage, Storage>;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub orchestrator: Arc<FormOrchestrator>,
}

impl ApiContext {
    pub fn new(storage: Storage, retry: RetryPolicy) -> Self {
        let orchestrator =
            Orchestrator::new(storage.clone(), storage.clone()).with_retry_policy(retry);
        Self {
            storage,
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub async fn create_form(
    ctx: &ApiContext,
    request: &CreateFormRequest,
) -> Result<FormDefinitionResponse, ApiError> {
    let schema = ctx
        .orchestrator
        .create_form(request)
        .await
        .map_err(create_form_error)?;
    info!(
        form_id = %schema.id,
        form_name = %schema.name,
        fields = schema.fields.len(),
        "form definition created"
    );
    Ok(schema.into())
}

pub async fn get_form_definition(
    ctx: &ApiContext,
    form_name: &str,
) -> Result<FormDefinitionResponse, ApiError> {
    load_by_name(ctx, form_name).await.map(Into::into)
}

pub async fn get_form_by_id(
    ctx: &ApiContext,
    form_id: FormId,
) -> Result<FormDefinitionResponse, ApiError> {
    ctx.storage
        .get_form_by_id(form_id)
        .await
        .map_err(metadata_error)?
        .map(Into::into)
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, format!("form {form_id} not found")))
}

pub async fn list_forms(ctx: &ApiContext) -> Result<Vec<FormSummary>, ApiError> {
    ctx.storage.list_forms().await.map_err(metadata_error)
}

/// Accepts one record for a provisioned form and writes it to the form's table.
pub async fn submit_form_data(
    ctx: &ApiContext,
    form_name: &str,
    payload: &FormDataPayload,
) -> Result<SubmissionReceipt, ApiError> {
    let schema = load_by_name(ctx, form_name).await?;
    let values = validate_submission(&schema, payload)
        .map_err(|err| ApiError::new(ErrorCode::Validation, err.to_string()))?;

    let submitted_at = Utc::now();
    let row_id = ctx
        .storage
        .insert_row(&schema.user_data_table_name, &values, submitted_at)
        .await
        .map_err(|err| match err {
            EngineError::TableExists(table) => ApiError::new(
                ErrorCode::Internal,
                format!("unexpected table conflict on '{table}'"),
            ),
            EngineError::Unavailable(reason) => {
                warn!(form_name = %schema.name, %reason, "submission insert failed");
                ApiError::new(ErrorCode::StorageUnavailable, reason)
            }
        })?;

    Ok(SubmissionReceipt {
        form_name: schema.name,
        row_id,
        submitted_at,
    })
}

async fn load_by_name(ctx: &ApiContext, form_name: &str) -> Result<FormSchema, ApiError> {
    ctx.storage
        .get_form_by_name(form_name)
        .await
        .map_err(metadata_error)?
        .ok_or_else(|| {
            ApiError::new(
                ErrorCode::NotFound,
                format!("form '{form_name}' not found"),
            )
        })
}

pub fn create_form_error(err: CreateFormError) -> ApiError {
    let message = err.to_string();
    match err {
        CreateFormError::Validation(_) => ApiError::new(ErrorCode::Validation, message),
        CreateFormError::Conflict(_) => ApiError::new(ErrorCode::Conflict, message),
        CreateFormError::NotFound(_) => ApiError::new(ErrorCode::NotFound, message),
        CreateFormError::StorageUnavailable(_) => {
            ApiError::new(ErrorCode::StorageUnavailable, message)
        }
        CreateFormError::ProvisioningFailed { source, .. } => match source {
            ProvisionError::TableAlreadyExists { .. } => {
                ApiError::new(ErrorCode::Conflict, message)
            }
            ProvisionError::StorageUnavailable(_) => {
                ApiError::new(ErrorCode::StorageUnavailable, message)
            }
        },
        CreateFormError::OrphanedMetadata { .. } | CreateFormError::ProvisioningInDoubt { .. } => {
            ApiError::new(ErrorCode::OrphanedMetadata, message)
        }
    }
}

fn metadata_error(err: MetadataError) -> ApiError {
    match err {
        MetadataError::NameTaken(name) => ApiError::new(
            ErrorCode::Conflict,
            format!("form name '{name}' is already taken"),
        ),
        MetadataError::Unavailable(reason) => ApiError::new(ErrorCode::StorageUnavailable, reason),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
