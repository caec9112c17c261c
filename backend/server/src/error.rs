use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reqwest::Response as UpstreamResponse;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Failure talking to one of the managed admin services.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

#[derive(Deserialize)]
struct UpstreamErrorBody {
    error: UpstreamErrorDetail,
}

#[derive(Deserialize)]
struct UpstreamErrorDetail {
    message: String,
}

impl StoreError {
    /// Passes successful responses through and turns anything else into
    /// [`StoreError::Upstream`] carrying the service's own message.
    pub async fn check(response: UpstreamResponse) -> Result<UpstreamResponse, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();

        Err(StoreError::Upstream {
            status: status.as_u16(),
            message: upstream_message(status, &body),
        })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Upstream { status: 404, .. })
    }
}

fn upstream_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<UpstreamErrorBody>(body) {
        return parsed.error.message;
    }

    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string())
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("User ID is required")]
    MissingUserId,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Admin services are not initialized")]
    Uninitialized,

    #[error(transparent)]
    Upstream(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload | AppError::MissingUserId => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Uninitialized | AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(%status, "Request failed: {self}");
        } else {
            warn!(%status, "Request rejected: {self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Diagnostic failures carry a `details` field next to `error`.
#[derive(Error, Debug)]
pub enum DiagnosticError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Document store is not initialized")]
    Uninitialized,

    #[error("Document store connection failed")]
    Unreachable(#[source] StoreError),
}

impl DiagnosticError {
    fn details(&self) -> String {
        match self {
            DiagnosticError::MethodNotAllowed => "Only GET is supported".to_string(),
            DiagnosticError::Uninitialized => {
                "Project id or admin access token is missing".to_string()
            }
            DiagnosticError::Unreachable(source) => source.to_string(),
        }
    }
}

impl IntoResponse for DiagnosticError {
    fn into_response(self) -> Response {
        let status = match self {
            DiagnosticError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            DiagnosticError::Uninitialized | DiagnosticError::Unreachable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let details = self.details();

        if status.is_server_error() {
            error!(%status, details = %details, "Diagnostic failed: {self}");
        } else {
            warn!(%status, "Diagnostic rejected: {self}");
        }

        (
            status,
            Json(json!({ "error": self.to_string(), "details": details })),
        )
            .into_response()
    }
}
