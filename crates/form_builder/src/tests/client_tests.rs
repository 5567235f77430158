use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode as HttpStatus,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::{compiler::compile, domain::FieldType, domain::FormSchema};
use tokio::net::TcpListener;

use super::*;
use crate::canvas::{DropIndicator, FieldPatch, Gesture, Outcome};

#[derive(Clone, Default)]
struct StubState {
    forms: Arc<Mutex<Vec<FormSchema>>>,
}

type StubError = (HttpStatus, Json<ApiError>);

async fn stub_create(
    State(state): State<StubState>,
    Json(request): Json<CreateFormRequest>,
) -> Result<(HttpStatus, Json<FormDefinitionResponse>), StubError> {
    let mut forms = state.forms.lock().expect("lock");
    if forms.iter().any(|f| f.name == request.name) {
        return Err((
            HttpStatus::CONFLICT,
            Json(ApiError::new(ErrorCode::Conflict, "name taken")),
        ));
    }
    let schema = compile(
        &request.drafts(),
        &request.name,
        &request.display_name,
        request.description.as_deref(),
    )
    .map_err(|e| {
        (
            HttpStatus::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, e.to_string())),
        )
    })?;
    forms.push(schema.clone());
    Ok((HttpStatus::CREATED, Json(schema.into())))
}

async fn stub_by_name(
    State(state): State<StubState>,
    Path(name): Path<String>,
) -> Result<Json<FormDefinitionResponse>, StubError> {
    state
        .forms
        .lock()
        .expect("lock")
        .iter()
        .find(|f| f.name == name)
        .cloned()
        .map(|schema| Json(schema.into()))
        .ok_or((
            HttpStatus::NOT_FOUND,
            Json(ApiError::new(ErrorCode::NotFound, "no such form")),
        ))
}

async fn stub_list(State(state): State<StubState>) -> Json<Vec<FormSummary>> {
    Json(
        state
            .forms
            .lock()
            .expect("lock")
            .iter()
            .map(FormSummary::from)
            .collect(),
    )
}

async fn stub_submit() -> StubError {
    (
        HttpStatus::SERVICE_UNAVAILABLE,
        Json(ApiError::new(ErrorCode::StorageUnavailable, "database is locked")),
    )
}

async fn spawn_form_server() -> Result<(String, StubState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = StubState::default();
    let app = Router::new()
        .route("/api/formdefinitions", post(stub_create).get(stub_list))
        .route("/api/formdefinitions/by-name/:name", get(stub_by_name))
        .route("/api/form-data/:name", post(stub_submit))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/"), state))
}

fn contact_session() -> EditorSession {
    let mut session = EditorSession::new("contact", "Contact");
    for (field_type, label) in [(FieldType::TextField, "Name"), (FieldType::NumberField, "Age")] {
        let Outcome::Inserted(id) = session.apply(Gesture::Insert {
            entry: field_type.into(),
            drop: DropIndicator::End,
        }) else {
            panic!("insert");
        };
        session.apply(Gesture::Update {
            id,
            patch: FieldPatch::label(label),
        });
    }
    session
}

#[tokio::test]
async fn saves_session_and_reads_it_back() {
    let (url, state) = spawn_form_server().await.expect("server");
    let client = FormServiceClient::new(url);

    let created = client
        .save_session(&contact_session())
        .await
        .expect("create");
    assert_eq!(created.user_data_table_name, "UserData_contact");
    assert_eq!(state.forms.lock().expect("lock").len(), 1);

    let fetched = client
        .get_form_definition("contact")
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(fetched.id, created.id);
    let names: Vec<&str> = fetched.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["name", "age"]);

    let listed = client.list_forms().await.expect("list");
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn missing_form_is_none() {
    let (url, _state) = spawn_form_server().await.expect("server");
    let client = FormServiceClient::new(url);
    assert!(client
        .get_form_definition("ghost")
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn server_errors_keep_their_code() {
    let (url, _state) = spawn_form_server().await.expect("server");
    let client = FormServiceClient::new(url);
    client
        .save_session(&contact_session())
        .await
        .expect("first");

    let conflict = client
        .save_session(&contact_session())
        .await
        .expect_err("duplicate");
    assert_eq!(conflict.api_code(), Some(ErrorCode::Conflict));
    assert!(!conflict.is_retryable());

    let payload = json!({ "name": "Ada" });
    let unavailable = client
        .submit_form_data("contact", payload.as_object().expect("object"))
        .await
        .expect_err("503");
    assert_eq!(unavailable.api_code(), Some(ErrorCode::StorageUnavailable));
    assert!(unavailable.is_retryable());
}

#[tokio::test]
async fn invalid_session_never_reaches_the_server() {
    let (url, state) = spawn_form_server().await.expect("server");
    let client = FormServiceClient::new(url);
    let session = EditorSession::new("9lives", "Cats");

    let err = client.save_session(&session).await.expect_err("invalid");
    assert!(matches!(err, ClientError::Invalid(_)));
    assert!(state.forms.lock().expect("lock").is_empty());
}
