//! Two-step form creation: metadata first, then the physical table, with
//! compensation when the second step fails.

use shared::{
    compiler::{self, FieldDraft, ValidationError},
    domain::{FormId, FormSchema},
    protocol::CreateFormRequest,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    locks::NameLocks,
    provisioner::{ProvisionError, ProvisionOutcome, TableProvisioner},
    retry::{retry_transient, RetryPolicy},
    store::{EngineError, MetadataError, MetadataStore, StorageEngine},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Draft,
    MetadataWritten,
    Provisioned,
    CompensatedRollback,
    OrphanedMetadata,
}

impl ProvisioningState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProvisioningState::MetadataWritten)
    }

    fn can_advance_to(self, next: ProvisioningState) -> bool {
        use ProvisioningState::*;
        matches!(
            (self, next),
            (Draft, MetadataWritten)
                | (MetadataWritten, Provisioned)
                | (MetadataWritten, CompensatedRollback)
                | (MetadataWritten, OrphanedMetadata)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateFormError {
    #[error("invalid form definition: {0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Conflict(String),
    #[error("form '{0}' does not exist")]
    NotFound(String),
    #[error("metadata store unavailable: {0}")]
    StorageUnavailable(String),
    #[error("provisioning '{form_name}' failed: {source}")]
    ProvisioningFailed {
        form_name: String,
        source: ProvisionError,
        compensation_applied: bool,
    },
    #[error(
        "form {form_id} ('{form_name}') has metadata but no table '{table}': \
         provisioning failed ({provision_error}) and compensation failed ({compensation_error})"
    )]
    OrphanedMetadata {
        form_id: FormId,
        form_name: String,
        table: String,
        provision_error: ProvisionError,
        compensation_error: MetadataError,
    },
    #[error(
        "form {form_id} ('{form_name}') kept its metadata: provisioning '{table}' failed \
         ({provision_error}) and the table could not be checked afterwards ({check_error})"
    )]
    ProvisioningInDoubt {
        form_id: FormId,
        form_name: String,
        table: String,
        provision_error: ProvisionError,
        check_error: EngineError,
    },
}

impl CreateFormError {
    pub fn is_retryable(&self) -> bool {
        match self {
            CreateFormError::StorageUnavailable(_) => true,
            CreateFormError::ProvisioningFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn compensation_applied(&self) -> bool {
        matches!(
            self,
            CreateFormError::ProvisioningFailed {
                compensation_applied: true,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProvisioningResult {
    Committed(FormSchema),
    Failed {
        state: ProvisioningState,
        error: CreateFormError,
        compensation_applied: bool,
    },
}

impl ProvisioningResult {
    pub fn state(&self) -> ProvisioningState {
        match self {
            ProvisioningResult::Committed(_) => ProvisioningState::Provisioned,
            ProvisioningResult::Failed { state, .. } => *state,
        }
    }

    pub fn into_result(self) -> Result<FormSchema, CreateFormError> {
        match self {
            ProvisioningResult::Committed(schema) => Ok(schema),
            ProvisioningResult::Failed { error, .. } => Err(error),
        }
    }
}

/// Tracks one run through the state machine so every transition is checked and logged.
struct Run<'a> {
    form_name: &'a str,
    state: ProvisioningState,
}

impl<'a> Run<'a> {
    fn new(form_name: &'a str) -> Self {
        Self {
            form_name,
            state: ProvisioningState::Draft,
        }
    }

    fn advance(&mut self, next: ProvisioningState) {
        if !self.state.can_advance_to(next) {
            error!(form = self.form_name, from = ?self.state, to = ?next, "illegal provisioning state transition");
        }
        info!(form = self.form_name, from = ?self.state, to = ?next, "provisioning state changed");
        self.state = next;
    }

    fn fail(self, error: CreateFormError) -> ProvisioningResult {
        ProvisioningResult::Failed {
            state: self.state,
            compensation_applied: error.compensation_applied(),
            error,
        }
    }
}

pub struct Orchestrator<M: MetadataStore, E: StorageEngine> {
    metadata: M,
    provisioner: TableProvisioner<E>,
    retry: RetryPolicy,
    locks: NameLocks,
}

impl<M: MetadataStore, E: StorageEngine> Orchestrator<M, E> {
    pub fn new(metadata: M, engine: E) -> Self {
        Self {
            metadata,
            provisioner: TableProvisioner::new(engine),
            retry: RetryPolicy::default(),
            locks: NameLocks::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn engine(&self) -> &E {
        self.provisioner.engine()
    }

    pub async fn create_form(
        &self,
        request: &CreateFormRequest,
    ) -> Result<FormSchema, CreateFormError> {
        self.run(
            &request.drafts(),
            &request.name,
            &request.display_name,
            request.description.as_deref(),
        )
        .await
        .into_result()
    }

    pub async fn run(
        &self,
        drafts: &[FieldDraft],
        form_name: &str,
        display_name: &str,
        description: Option<&str>,
    ) -> ProvisioningResult {
        let mut run = Run::new(form_name);

        let schema = match compiler::compile(drafts, form_name, display_name, description) {
            Ok(schema) => schema,
            Err(err) => {
                info!(form = form_name, error = %err, "form definition rejected");
                return run.fail(err.into());
            }
        };

        let _name_guard = self.locks.lock(&schema.name).await;

        match self.metadata.get_form_by_name(&schema.name).await {
            Ok(Some(_)) => {
                return run.fail(CreateFormError::Conflict(format!(
                    "form name '{}' is already taken",
                    schema.name
                )))
            }
            Ok(None) => {}
            Err(err) => return run.fail(metadata_failure(err)),
        }

        if let Err(err) = self.metadata.add_form_definition(&schema).await {
            warn!(form = form_name, error = %err, "writing form metadata failed");
            return run.fail(metadata_failure(err));
        }
        run.advance(ProvisioningState::MetadataWritten);

        let provisioned = retry_transient(self.retry, ProvisionError::is_retryable, || {
            self.provisioner.provision(&schema)
        })
        .await;

        let provision_error = match provisioned {
            Ok(_) => {
                run.advance(ProvisioningState::Provisioned);
                return ProvisioningResult::Committed(schema);
            }
            Err(err) => err,
        };

        // A storage fault may hide a committed create; look before compensating.
        if provision_error.is_retryable() {
            match self.engine().table_owner(&schema.user_data_table_name).await {
                Ok(Some(owner)) if owner == schema.id => {
                    warn!(
                        form = form_name,
                        form_id = %schema.id,
                        error = %provision_error,
                        "table was created despite the storage error"
                    );
                    run.advance(ProvisioningState::Provisioned);
                    return ProvisioningResult::Committed(schema);
                }
                Ok(_) => {}
                Err(check_error) => {
                    run.advance(ProvisioningState::OrphanedMetadata);
                    error!(
                        form = form_name,
                        form_id = %schema.id,
                        table = %schema.user_data_table_name,
                        provision_error = %provision_error,
                        check_error = %check_error,
                        "PROVISIONING IN DOUBT: metadata kept, table state unknown; run reprovision"
                    );
                    return run.fail(CreateFormError::ProvisioningInDoubt {
                        form_id: schema.id,
                        form_name: schema.name,
                        table: schema.user_data_table_name,
                        provision_error,
                        check_error,
                    });
                }
            }
        }

        warn!(
            form = form_name,
            form_id = %schema.id,
            error = %provision_error,
            "provisioning failed, removing form metadata"
        );
        match self.metadata.remove_form_definition(schema.id).await {
            Ok(()) => {
                run.advance(ProvisioningState::CompensatedRollback);
                run.fail(CreateFormError::ProvisioningFailed {
                    form_name: schema.name,
                    source: provision_error,
                    compensation_applied: true,
                })
            }
            Err(compensation_error) => {
                run.advance(ProvisioningState::OrphanedMetadata);
                error!(
                    form = form_name,
                    form_id = %schema.id,
                    table = %schema.user_data_table_name,
                    provision_error = %provision_error,
                    compensation_error = %compensation_error,
                    "ORPHANED METADATA: form metadata exists without a backing table; operator action required"
                );
                run.fail(CreateFormError::OrphanedMetadata {
                    form_id: schema.id,
                    form_name: schema.name,
                    table: schema.user_data_table_name,
                    provision_error,
                    compensation_error,
                })
            }
        }
    }

    /// Operator repair path: provisions the table for a form whose metadata
    /// already exists. Safe to call for forms that are fully provisioned.
    pub async fn reprovision(&self, form_name: &str) -> Result<ProvisionOutcome, CreateFormError> {
        let _name_guard = self.locks.lock(form_name).await;
        let schema = self
            .metadata
            .get_form_by_name(form_name)
            .await
            .map_err(metadata_failure)?
            .ok_or_else(|| CreateFormError::NotFound(form_name.to_string()))?;

        retry_transient(self.retry, ProvisionError::is_retryable, || {
            self.provisioner.provision(&schema)
        })
        .await
        .map_err(|source| CreateFormError::ProvisioningFailed {
            form_name: schema.name.clone(),
            source,
            compensation_applied: false,
        })
    }
}

fn metadata_failure(err: MetadataError) -> CreateFormError {
    match err {
        MetadataError::NameTaken(name) => {
            CreateFormError::Conflict(format!("form name '{name}' is already taken"))
        }
        MetadataError::Unavailable(reason) => CreateFormError::StorageUnavailable(reason),
    }
}
