//! Task records, status transitions, and the role view filter.

use crate::{TaskCategory, TaskStatus, User, UserRole};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A unit of requested assistance.
///
/// `helper_id` is set if and only if `status` is past [`TaskStatus::Open`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    pub requester_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_id: Option<String>,
    pub status: TaskStatus,
    pub credit_value: u32,
    pub location: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// Actions a participant can take on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    /// Volunteer takes an open task.
    Accept,
    /// Volunteer reports the task done.
    Complete,
    /// Administrator confirms the work.
    Verify,
}

impl TaskAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Complete => "complete",
            Self::Verify => "verify",
        }
    }

    /// The status a task must be in for this action to apply.
    pub fn precondition(self) -> TaskStatus {
        match self {
            Self::Accept => TaskStatus::Open,
            Self::Complete => TaskStatus::InProgress,
            Self::Verify => TaskStatus::Completed,
        }
    }

    /// The status a task is in after this action applies.
    pub fn outcome(self) -> TaskStatus {
        match self {
            Self::Accept => TaskStatus::InProgress,
            Self::Complete => TaskStatus::Completed,
            Self::Verify => TaskStatus::Verified,
        }
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by [`Task::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The task is not in the status the action requires. The task is left
    /// unchanged.
    #[error("cannot {action} a task that is {status}")]
    InvalidTransition {
        action: TaskAction,
        status: TaskStatus,
    },
}

impl Task {
    /// Applies `action` on behalf of `actor_id`.
    ///
    /// Returns the updated task. On a precondition violation the receiver is
    /// not modified and [`TransitionError::InvalidTransition`] is returned.
    /// `accept` records the actor as the helper; the other actions keep the
    /// existing helper.
    pub fn apply(&self, action: TaskAction, actor_id: &str) -> Result<Task, TransitionError> {
        if self.status != action.precondition() {
            return Err(TransitionError::InvalidTransition {
                action,
                status: self.status,
            });
        }

        let mut next = self.clone();
        next.status = action.outcome();
        if action == TaskAction::Accept {
            next.helper_id = Some(actor_id.to_string());
        }
        Ok(next)
    }
}

/// Returns the tasks `user` is shown, in the order given.
///
/// - Elders see the tasks they requested.
/// - Teens see every open task plus the tasks they are helping with; a task
///   matching both rules appears once.
/// - Admins see everything.
pub fn visible_tasks<'a>(tasks: &'a [Task], user: &User) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| match user.role {
            UserRole::Elder => task.requester_id == user.id,
            UserRole::Teen => {
                task.status == TaskStatus::Open || task.helper_id.as_deref() == Some(&user.id)
            }
            UserRole::Admin => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: UserRole) -> User {
        User {
            id: id.to_string(),
            name: id.to_uppercase(),
            role,
            credits: 0,
            avatar: String::new(),
            bio: None,
            is_verified: true,
        }
    }

    fn task(id: &str, requester: &str, helper: Option<&str>, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            title: format!("title {id}"),
            description: String::new(),
            category: TaskCategory::Tech,
            requester_id: requester.to_string(),
            helper_id: helper.map(str::to_string),
            status,
            credit_value: 10,
            location: "Oak Avenue".to_string(),
            created_at: 0,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task("a", "e1", None, TaskStatus::Open),
            task("b", "e2", Some("t1"), TaskStatus::InProgress),
            task("c", "e1", Some("t2"), TaskStatus::Completed),
            task("d", "e2", None, TaskStatus::Open),
            task("e", "e1", Some("t1"), TaskStatus::Verified),
        ]
    }

    fn ids(view: Vec<&Task>) -> Vec<&str> {
        view.into_iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn elder_sees_exactly_own_requests() {
        let tasks = sample();
        assert_eq!(ids(visible_tasks(&tasks, &user("e1", UserRole::Elder))), ["a", "c", "e"]);
        assert_eq!(ids(visible_tasks(&tasks, &user("e2", UserRole::Elder))), ["b", "d"]);
        assert!(visible_tasks(&tasks, &user("e9", UserRole::Elder)).is_empty());
    }

    #[test]
    fn teen_sees_open_tasks_and_own_assignments() {
        let tasks = sample();
        assert_eq!(ids(visible_tasks(&tasks, &user("t1", UserRole::Teen))), ["a", "b", "d", "e"]);
        assert_eq!(ids(visible_tasks(&tasks, &user("t2", UserRole::Teen))), ["a", "c", "d"]);
    }

    #[test]
    fn teen_sees_open_task_they_help_once() {
        // Inconsistent record, but the filter must still not duplicate it.
        let tasks = vec![task("x", "e1", Some("t1"), TaskStatus::Open)];
        assert_eq!(ids(visible_tasks(&tasks, &user("t1", UserRole::Teen))), ["x"]);
    }

    #[test]
    fn admin_sees_everything() {
        let tasks = sample();
        assert_eq!(visible_tasks(&tasks, &user("a1", UserRole::Admin)).len(), tasks.len());
    }

    #[test]
    fn full_lifecycle_in_order() {
        let open = task("a", "e1", None, TaskStatus::Open);
        let accepted = open.apply(TaskAction::Accept, "t1").unwrap();
        assert_eq!(accepted.status, TaskStatus::InProgress);
        assert_eq!(accepted.helper_id.as_deref(), Some("t1"));

        let completed = accepted.apply(TaskAction::Complete, "t1").unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
        assert_eq!(completed.helper_id.as_deref(), Some("t1"));

        let verified = completed.apply(TaskAction::Verify, "a1").unwrap();
        assert_eq!(verified.status, TaskStatus::Verified);
        assert_eq!(verified.helper_id.as_deref(), Some("t1"));
    }

    #[test]
    fn actions_out_of_order_are_rejected() {
        let statuses = [
            TaskStatus::Open,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Verified,
        ];
        let actions = [TaskAction::Accept, TaskAction::Complete, TaskAction::Verify];

        for status in statuses {
            let helper = status.requires_helper().then_some("t1");
            let original = task("a", "e1", helper, status);
            for action in actions {
                if action.precondition() == status {
                    continue;
                }
                let err = original.apply(action, "t2").unwrap_err();
                assert_eq!(err, TransitionError::InvalidTransition { action, status });
                assert_eq!(original, task("a", "e1", helper, status));
            }
        }
    }

    #[test]
    fn transitions_preserve_helper_invariant() {
        let mut current = task("a", "e1", None, TaskStatus::Open);
        for action in [TaskAction::Accept, TaskAction::Complete, TaskAction::Verify] {
            current = current.apply(action, "t1").unwrap();
            assert_eq!(current.helper_id.is_some(), current.status.requires_helper());
        }
    }

    #[test]
    fn task_serializes_camel_case_without_empty_helper() {
        let json = serde_json::to_value(task("a", "e1", None, TaskStatus::Open)).unwrap();
        assert_eq!(json["requesterId"], "e1");
        assert_eq!(json["creditValue"], 10);
        assert!(json.get("helperId").is_none());
    }
}
