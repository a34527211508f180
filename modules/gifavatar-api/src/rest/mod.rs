pub mod submit;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use gifavatar_verifier::VerifyError;

use crate::AppState;

// --- Query structs ---

#[derive(Deserialize)]
pub struct ListQuery {
    limit: Option<u32>,
}

// --- Helpers ---

pub fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Map orchestrator errors onto HTTP statuses. Store failures are logged and hidden.
pub fn verify_error_response(err: VerifyError) -> Response {
    let status = match &err {
        VerifyError::InvalidUrlFormat(_) => StatusCode::BAD_REQUEST,
        VerifyError::NotFound(_) => StatusCode::NOT_FOUND,
        VerifyError::InvalidTransition { .. }
        | VerifyError::NotRetryable { .. }
        | VerifyError::RescanLimitReached { .. }
        | VerifyError::ConcurrentAttempt(_) => StatusCode::CONFLICT,
        VerifyError::Store(e) => {
            warn!(error = %e, "Submission store error");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    error_body(status, err.to_string())
}

// --- Handlers ---

pub async fn api_submission_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.verifier.get(id).await {
        Ok(submission) => Json(submission).into_response(),
        Err(e) => verify_error_response(e),
    }
}

pub async fn api_submission_rescan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.verifier.rescan(id).await {
        Ok(submission) => Json(submission).into_response(),
        Err(e) => verify_error_response(e),
    }
}

pub async fn api_user_submissions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<ListQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(20).min(100);
    match state.verifier.list_for_user(&user_id, limit).await {
        Ok(submissions) => Json(submissions).into_response(),
        Err(e) => verify_error_response(e),
    }
}
