//! Task API handlers.

use crate::api::{require_user, ApiError};
use crate::{controller, AppState};
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
};
use genbridge_gateway::{Coordinates, LocationContext};
use genbridge_types::{Task, TaskAction};
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters for `GET /api/tasks`.
#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    /// Acting user; the list is filtered to what they may see.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Request body for `POST /api/tasks`.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub description: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Request body for `POST /api/tasks/{taskId}/actions`.
#[derive(Debug, Deserialize)]
pub struct TaskActionRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub action: TaskAction,
}

pub(crate) fn coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinates> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    }
}

/// Handler for `GET /api/tasks`.
pub async fn list_tasks_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    match query.user_id {
        Some(user_id) => {
            let user = require_user(&state, &user_id)?;
            Ok(Json(state.store.visible_to(&user)))
        }
        None => Ok(Json(state.store.list())),
    }
}

/// Handler for `POST /api/tasks`.
///
/// Classifies the description and stores the resulting task. Responds 422
/// when the description cannot be classified.
pub async fn create_task_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if payload.description.trim().is_empty() {
        return Err(ApiError::BadRequest("description must not be blank".to_string()));
    }
    let actor = require_user(&state, &payload.user_id)?;
    let near = coordinates(payload.latitude, payload.longitude);

    match controller::create_task(&state, &actor, &payload.description, near).await? {
        Some(task) => Ok((StatusCode::CREATED, Json(task))),
        None => Err(ApiError::Unprocessable(
            "the request could not be classified".to_string(),
        )),
    }
}

/// Handler for `POST /api/tasks/{taskId}/actions`.
pub async fn task_action_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(task_id): Path<String>,
    Json(payload): Json<TaskActionRequest>,
) -> Result<Json<Task>, ApiError> {
    let actor = require_user(&state, &payload.user_id)?;
    let task = controller::apply_action(&state, &task_id, payload.action, &actor)?;
    Ok(Json(task))
}

/// Handler for `GET /api/tasks/{taskId}/location`.
///
/// Tasks filed under the fallback label, and lookups that fail, yield an
/// empty context.
pub async fn task_location_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<LocationContext>, ApiError> {
    let task = state
        .store
        .get(&task_id)
        .ok_or_else(|| ApiError::NotFound(format!("task {}", task_id)))?;

    if task.location.trim().is_empty() || task.location == state.tasks.fallback_location {
        return Ok(Json(LocationContext::default()));
    }

    match state.gateway.location_context(&task.location, None).await {
        Ok(context) => Ok(Json(context)),
        Err(e) => {
            tracing::warn!(task_id = %task.id, error = %e, "location context unavailable");
            Ok(Json(LocationContext::default()))
        }
    }
}
