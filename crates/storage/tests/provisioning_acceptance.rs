use provisioning::{MetadataStore, Orchestrator, ProvisioningState, RetryPolicy, StorageEngine};
use shared::{compiler::FieldDraft, domain::FieldType};
use storage::Storage;

fn contact_drafts() -> Vec<FieldDraft> {
    vec![
        FieldDraft::new(FieldType::TextField, "Name").required(true),
        FieldDraft::new(FieldType::NumberField, "Age"),
    ]
}

#[tokio::test]
async fn contact_form_provisions_metadata_and_table() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let orchestrator = Orchestrator::new(storage.clone(), storage.clone());

    let result = orchestrator
        .run(&contact_drafts(), "contact", "Contact", None)
        .await;
    assert_eq!(result.state(), ProvisioningState::Provisioned);
    let schema = result.into_result().expect("committed");

    let stored = storage
        .get_form_by_name("contact")
        .await
        .expect("lookup")
        .expect("metadata stored");
    assert_eq!(stored.id, schema.id);
    let sort_orders: Vec<i32> = stored.fields.iter().map(|f| f.sort_order).collect();
    assert_eq!(sort_orders, vec![0, 1]);

    let columns = storage
        .table_columns("UserData_contact")
        .await
        .expect("columns");
    assert_eq!(
        columns,
        vec![
            ("id".to_string(), "INTEGER".to_string()),
            ("name".to_string(), "TEXT".to_string()),
            ("age".to_string(), "REAL".to_string()),
            ("submitted_at".to_string(), "TEXT".to_string()),
        ]
    );
    assert_eq!(
        storage.table_owner("UserData_contact").await.expect("owner"),
        Some(schema.id)
    );
}

#[tokio::test]
async fn stray_table_triggers_compensation() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    sqlx::query("CREATE TABLE \"UserData_contact\" (legacy TEXT)")
        .execute(storage.pool())
        .await
        .expect("stray table");
    let orchestrator = Orchestrator::new(storage.clone(), storage.clone())
        .with_retry_policy(RetryPolicy::no_retry());

    let result = orchestrator
        .run(&contact_drafts(), "contact", "Contact", None)
        .await;

    assert_eq!(result.state(), ProvisioningState::CompensatedRollback);
    assert!(storage
        .get_form_by_name("contact")
        .await
        .expect("lookup")
        .is_none());
    assert!(storage.list_forms().await.expect("list").is_empty());
}
