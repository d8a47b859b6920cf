//! The in-memory task store.

use crate::error::TaskError;
use genbridge_types::{visible_tasks, Task, TaskAction, User};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Inner {
    /// Newest first.
    tasks: Vec<Task>,
    revision: u64,
}

/// Shared handle to the task collection.
///
/// Uses `std::sync::RwLock`: every critical section is a short vector
/// operation and no guard is ever held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    inner: Arc<RwLock<Inner>>,
}

impl TaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `tasks`, kept in the given order.
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner { tasks, revision: 0 })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        // A panic while holding the lock cannot leave a half-written task
        // behind, so recover the guard.
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a snapshot of every task, newest first.
    pub fn list(&self) -> Vec<Task> {
        self.read().tasks.clone()
    }

    /// Returns the tasks `user` is allowed to see, newest first.
    pub fn visible_to(&self, user: &User) -> Vec<Task> {
        let inner = self.read();
        visible_tasks(&inner.tasks, user).into_iter().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.read().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().tasks.is_empty()
    }

    /// Number of mutations applied since the store was created.
    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Every task together with the revision it was read at.
    pub fn snapshot(&self) -> (u64, Vec<Task>) {
        let inner = self.read();
        (inner.revision, inner.tasks.clone())
    }

    /// Adds a task at the front of the collection.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Duplicate`] if a task with the same id exists.
    pub fn insert(&self, task: Task) -> Result<Task, TaskError> {
        let mut inner = self.write();
        if inner.tasks.iter().any(|t| t.id == task.id) {
            return Err(TaskError::Duplicate(task.id));
        }
        inner.tasks.insert(0, task.clone());
        inner.revision += 1;
        tracing::debug!(task_id = %task.id, category = %task.category, "task added");
        Ok(task)
    }

    /// Applies a status transition to the task with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] for an unknown id and
    /// [`TaskError::Transition`] when the action's precondition does not
    /// hold. In both cases the store is unchanged.
    pub fn apply_action(
        &self,
        task_id: &str,
        action: TaskAction,
        actor_id: &str,
    ) -> Result<Task, TaskError> {
        let mut inner = self.write();
        let slot = inner
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        let updated = slot.apply(action, actor_id)?;
        *slot = updated.clone();
        inner.revision += 1;

        tracing::info!(
            task_id,
            action = action.as_str(),
            actor_id,
            status = %updated.status,
            "task status changed"
        );
        Ok(updated)
    }
}
