use reqwest::{Client, Response, StatusCode};
use shared::{
    compiler::ValidationError,
    domain::{FormId, FormSummary},
    error::{ApiError, ErrorCode},
    protocol::{
        form_data_route, form_definitions_route, CreateFormRequest, FormDataPayload,
        FormDefinitionResponse, SubmissionReceipt,
    },
};
use thiserror::Error;
use tracing::info;

use crate::session::EditorSession;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("form is not valid: {0}")]
    Invalid(#[from] ValidationError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected request ({status}): {error}")]
    Api { status: StatusCode, error: ApiError },
}

impl ClientError {
    pub fn api_code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api { error, .. } => Some(error.code),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Api { error, .. } => error.retryable,
            ClientError::Transport(err) => err.is_connect() || err.is_timeout(),
            ClientError::Invalid(_) => false,
        }
    }
}

pub struct FormServiceClient {
    http: Client,
    server_url: String,
}

impl FormServiceClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: impl Into<String>) -> Self {
        let server_url: String = server_url.into();
        Self {
            http,
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub async fn create_form(
        &self,
        request: &CreateFormRequest,
    ) -> Result<FormDefinitionResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}{}", self.server_url, form_definitions_route()))
            .json(request)
            .send()
            .await?;
        let created: FormDefinitionResponse = expect_success(response).await?.json().await?;
        info!(form_id = %created.id, form_name = %created.name, "form created");
        Ok(created)
    }

    /// Compiles the session locally and submits it.
    pub async fn save_session(
        &self,
        session: &EditorSession,
    ) -> Result<FormDefinitionResponse, ClientError> {
        let request = session.build_request()?;
        self.create_form(&request).await
    }

    pub async fn get_form_definition(
        &self,
        form_name: &str,
    ) -> Result<Option<FormDefinitionResponse>, ClientError> {
        let url = format!(
            "{}{}/by-name/{form_name}",
            self.server_url,
            form_definitions_route()
        );
        self.get_optional(url).await
    }

    pub async fn get_form_by_id(
        &self,
        form_id: FormId,
    ) -> Result<Option<FormDefinitionResponse>, ClientError> {
        let url = format!("{}{}/{form_id}", self.server_url, form_definitions_route());
        self.get_optional(url).await
    }

    pub async fn list_forms(&self) -> Result<Vec<FormSummary>, ClientError> {
        let response = self
            .http
            .get(format!("{}{}", self.server_url, form_definitions_route()))
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    pub async fn submit_form_data(
        &self,
        form_name: &str,
        payload: &FormDataPayload,
    ) -> Result<SubmissionReceipt, ClientError> {
        let response = self
            .http
            .post(format!("{}{}", self.server_url, form_data_route(form_name)))
            .json(payload)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    async fn get_optional(
        &self,
        url: String,
    ) -> Result<Option<FormDefinitionResponse>, ClientError> {
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(expect_success(response).await?.json().await?))
    }
}

async fn expect_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await?;
    let error = serde_json::from_str::<ApiError>(&body).unwrap_or_else(|_| {
        let code = if status.is_server_error() {
            ErrorCode::Internal
        } else {
            ErrorCode::Validation
        };
        ApiError::new(code, body.clone())
    });
    Err(ClientError::Api { status, error })
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
