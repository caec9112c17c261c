use std::sync::Arc;

use axum::{
    Json,
    extract::{self, rejection::JsonRejection},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    accounts::{self, Operation},
    error::{AppError, DiagnosticError},
    state::State,
};

pub const DIAGNOSTIC_COLLECTION: &str = "_diagnostics";
pub const DIAGNOSTIC_DOCUMENT: &str = "connection";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    user_id: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

impl From<Operation> for MessageResponse {
    fn from(operation: Operation) -> Self {
        Self {
            message: operation.success_message(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResponse {
    success: bool,
    message: &'static str,
    timestamp: String,
    has_connection: bool,
}

type Payload = Result<Json<UserRequest>, JsonRejection>;

/// Blank ids count as missing. The id itself is opaque and passed on as is.
fn user_id(payload: Payload) -> Result<String, AppError> {
    let Json(request) = payload.map_err(|e| {
        warn!("Rejected payload: {e}");
        AppError::MalformedPayload
    })?;

    request
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(AppError::MissingUserId)
}

pub async fn soft_delete_handler(
    extract::State(state): extract::State<Arc<State>>,
    payload: Payload,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = user_id(payload)?;

    accounts::soft_delete(state.admin()?, &state.config.users_collection, &user_id).await?;

    Ok(Json(Operation::SoftDelete.into()))
}

pub async fn reactivate_handler(
    extract::State(state): extract::State<Arc<State>>,
    payload: Payload,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = user_id(payload)?;

    accounts::reactivate(state.admin()?, &state.config.users_collection, &user_id).await?;

    Ok(Json(Operation::Reactivate.into()))
}

pub async fn permanently_delete_handler(
    extract::State(state): extract::State<Arc<State>>,
    payload: Payload,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = user_id(payload)?;

    accounts::permanently_delete(state.admin()?, &state.config.users_collection, &user_id)
        .await?;

    Ok(Json(Operation::PermanentDelete.into()))
}

pub async fn diagnostic_handler(
    extract::State(state): extract::State<Arc<State>>,
) -> Result<Json<DiagnosticResponse>, DiagnosticError> {
    let admin = state.admin.as_ref().ok_or(DiagnosticError::Uninitialized)?;

    let document = admin
        .documents
        .get(DIAGNOSTIC_COLLECTION, DIAGNOSTIC_DOCUMENT)
        .await
        .map_err(DiagnosticError::Unreachable)?;

    info!(
        document_exists = document.is_some(),
        "Document store reachable"
    );

    Ok(Json(DiagnosticResponse {
        success: true,
        message: "Document store connection successful",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        has_connection: true,
    }))
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn diagnostic_method_not_allowed() -> DiagnosticError {
    DiagnosticError::MethodNotAllowed
}
