use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use server_api::{
    create_form, get_form_by_id, get_form_definition, list_forms, submit_form_data, ApiContext,
};
use shared::{
    domain::{FormId, FormSummary},
    error::{ApiError, ErrorCode},
    protocol::{CreateFormRequest, FormDefinitionResponse, SubmissionReceipt},
};
use storage::Storage;
use tracing::{error, info, warn};

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

const RETRY_AFTER_SECONDS: &str = "1";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext::new(storage, settings.retry_policy());
    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "form service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/formdefinitions",
            post(http_create_form).get(http_list_forms),
        )
        .route(
            "/api/formdefinitions/by-name/:form_name",
            get(http_get_form_by_name),
        )
        .route("/api/formdefinitions/:form_id", get(http_get_form_by_id))
        .route("/api/form-data/:form_name", post(http_submit_form_data))
        .with_state(state)
}

/// `ApiError` rendered with the status code its error code maps to.
struct HttpError(ApiError);

impl From<ApiError> for HttpError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ApiError::new(ErrorCode::Validation, rejection.body_text()))
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.code);
        if status.is_server_error() {
            warn!(code = ?self.0.code, message = %self.0.message, "request failed");
        }
        let mut response = (status, Json(self.0)).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_static(RETRY_AFTER_SECONDS),
            );
        }
        response
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::OrphanedMetadata | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        HttpError(ApiError::new(ErrorCode::StorageUnavailable, e.to_string()))
    })?;
    Ok("ok")
}

async fn http_create_form(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateFormRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FormDefinitionResponse>), HttpError> {
    let Json(request) = body?;
    let created = create_form(&state.api, &request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn http_list_forms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FormSummary>>, HttpError> {
    Ok(Json(list_forms(&state.api).await?))
}

async fn http_get_form_by_name(
    State(state): State<Arc<AppState>>,
    Path(form_name): Path<String>,
) -> Result<Json<FormDefinitionResponse>, HttpError> {
    Ok(Json(get_form_definition(&state.api, &form_name).await?))
}

async fn http_get_form_by_id(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<FormDefinitionResponse>, HttpError> {
    let form_id: FormId = raw_id.parse().map_err(|_| {
        HttpError(ApiError::new(
            ErrorCode::Validation,
            format!("'{raw_id}' is not a form id"),
        ))
    })?;
    Ok(Json(get_form_by_id(&state.api, form_id).await?))
}

async fn http_submit_form_data(
    State(state): State<Arc<AppState>>,
    Path(form_name): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), HttpError> {
    let Json(body) = body?;
    let serde_json::Value::Object(payload) = body else {
        return Err(HttpError(ApiError::new(
            ErrorCode::Validation,
            "form data must be a JSON object",
        )));
    };
    let receipt = submit_form_data(&state.api, &form_name, &payload).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
