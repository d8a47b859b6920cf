//! Shared API error type and the user directory handlers.

use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use genbridge_tasks::TaskError;
use genbridge_types::User;
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// The request was well formed but could not be turned into a task.
    #[error("unprocessable: {0}")]
    Unprocessable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<TaskError> for ApiError {
    fn from(e: TaskError) -> Self {
        match e {
            TaskError::NotFound(id) => ApiError::NotFound(format!("task {}", id)),
            TaskError::Duplicate(_) | TaskError::Transition(_) => ApiError::Conflict(e.to_string()),
        }
    }
}

/// Looks up the acting user or fails with 404.
pub(crate) fn require_user(state: &AppState, user_id: &str) -> Result<User, ApiError> {
    state
        .users
        .get(user_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("user {}", user_id)))
}

/// Handler for `GET /api/users`.
pub async fn list_users_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Vec<User>> {
    Json(state.users.all().to_vec())
}

/// Handler for `GET /api/users/{userId}`.
pub async fn get_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    require_user(&state, &user_id).map(Json)
}
