//! Task pipeline shared by the REST API and the voice bridge.
//!
//! Gateway failures never surface as errors here: a missing classification
//! means no task, a missing location means the fallback label.

use crate::{AppState, TaskEvent};
use genbridge_gateway::Coordinates;
use genbridge_tasks::TaskError;
use genbridge_types::{Task, TaskAction, TaskStatus, User, UserRole};
use uuid::Uuid;

/// Words taken from the end of a description to look up its location.
const LOCATION_QUERY_WORDS: usize = 5;

/// The trailing words of a description, where people tend to say where.
pub fn location_query(description: &str) -> String {
    let words: Vec<&str> = description.split_whitespace().collect();
    let start = words.len().saturating_sub(LOCATION_QUERY_WORDS);
    words[start..].join(" ")
}

/// Turns a free-text request into a stored task.
///
/// Returns `Ok(None)` when the description is blank or the gateway cannot
/// classify it; nothing is stored in that case.
pub async fn create_task(
    state: &AppState,
    actor: &User,
    description: &str,
    near: Option<Coordinates>,
) -> Result<Option<Task>, TaskError> {
    let description = description.trim();
    if description.is_empty() {
        return Ok(None);
    }

    let analysis = match state.gateway.classify_task(description).await {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::warn!(error = %e, actor = %actor.id, "classification failed, no task created");
            return Ok(None);
        }
    };

    let query = location_query(description);
    let location = match state.gateway.location_context(&query, near).await {
        Ok(context) => context
            .links
            .into_iter()
            .map(|link| link.title)
            .find(|title| !title.trim().is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, "location lookup failed, using fallback");
            None
        }
    }
    .unwrap_or_else(|| state.tasks.fallback_location.clone());

    let requester_id = if actor.role == UserRole::Elder {
        actor.id.clone()
    } else {
        state.tasks.default_requester_id.clone()
    };

    let task = Task {
        id: format!("task-{}", Uuid::new_v4()),
        title: analysis.title,
        description: analysis.refined_description,
        category: analysis.category,
        requester_id,
        helper_id: None,
        status: TaskStatus::Open,
        credit_value: analysis.suggested_credits,
        location,
        created_at: chrono::Utc::now().timestamp_millis(),
    };
    let task = state.store.insert(task)?;
    tracing::info!(task_id = %task.id, category = %task.category, "task created");
    state.publish(TaskEvent::TaskCreated { task: task.clone() });
    Ok(Some(task))
}

/// Applies `action` on behalf of `actor` and publishes the result.
pub fn apply_action(
    state: &AppState,
    task_id: &str,
    action: TaskAction,
    actor: &User,
) -> Result<Task, TaskError> {
    let task = state.store.apply_action(task_id, action, &actor.id)?;
    state.publish(TaskEvent::TaskUpdated { task: task.clone() });
    Ok(task)
}
