mod locks;
mod orchestrator;
mod provisioner;
mod retry;
mod store;

pub use locks::{NameLockGuard, NameLocks};
pub use orchestrator::{CreateFormError, Orchestrator, ProvisioningResult, ProvisioningState};
pub use provisioner::{
    table_layout, ColumnDef, ColumnRole, ProvisionError, ProvisionOutcome, TableLayout,
    TableProvisioner, PRIMARY_KEY_COLUMN, SUBMITTED_AT_COLUMN,
};
pub use retry::{retry_transient, RetryPolicy};
pub use store::{CellValue, EngineError, MetadataError, MetadataStore, StorageEngine};
