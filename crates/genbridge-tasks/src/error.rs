//! Error types for the task store.

use genbridge_types::TransitionError;

/// Errors that can occur during task store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// No task with the given id exists.
    #[error("task not found: {0}")]
    NotFound(String),

    /// A task with the same id is already stored.
    #[error("task already exists: {0}")]
    Duplicate(String),

    /// The requested status change is not allowed from the current status.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}
