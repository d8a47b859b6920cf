//! Shared types, error definitions, and constants for the GenBridge platform.
//!
//! This crate provides the foundational types used across all GenBridge
//! crates: participant roles, task records and their lifecycle, the role
//! view filter, voice assistant status, and the aggregate impact figures
//! shown on the administrator dashboard.
//!
//! Nothing here performs I/O. Every function is pure so that the store, the
//! HTTP layer, and the voice assistant can share the same rules.

pub mod task;
pub mod voice;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use task::{visible_tasks, Task, TaskAction, TransitionError};
pub use voice::VoiceStatus;

/// Participant roles.
///
/// Roles are mutually exclusive and fixed when the user is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// A youth volunteer who accepts and completes tasks.
    Teen,
    /// An elderly resident who requests help.
    Elder,
    /// A city administrator who verifies completed work.
    Admin,
}

impl UserRole {
    /// Returns the string label for this role.
    pub fn label(self) -> &'static str {
        match self {
            Self::Teen => "TEEN",
            Self::Elder => "ELDER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle state of a task.
///
/// The only legal order is `Open → InProgress → Completed → Verified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Posted and waiting for a volunteer.
    Open,
    /// Accepted by a volunteer.
    InProgress,
    /// Marked done by the volunteer, awaiting review.
    Completed,
    /// Reviewed by an administrator; credits are released.
    Verified,
}

impl TaskStatus {
    /// Returns the canonical string label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Verified => "VERIFIED",
        }
    }

    /// Whether a task in this status must carry a helper id.
    pub fn requires_helper(self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of help a task can ask for.
///
/// Serialized with the human-readable label, which is also what the
/// classification model is asked to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskCategory {
    #[serde(rename = "Tech Support")]
    Tech,
    #[serde(rename = "Grocery Shopping")]
    Grocery,
    #[serde(rename = "Garden Help")]
    Garden,
    #[serde(rename = "Companionship")]
    Social,
    #[serde(rename = "Light Admin")]
    Admin,
}

impl TaskCategory {
    /// All categories in display order.
    pub const ALL: [TaskCategory; 5] = [
        Self::Tech,
        Self::Grocery,
        Self::Garden,
        Self::Social,
        Self::Admin,
    ];

    /// Returns the display label for this category.
    pub fn label(self) -> &'static str {
        match self {
            Self::Tech => "Tech Support",
            Self::Grocery => "Grocery Shopping",
            Self::Garden => "Garden Help",
            Self::Social => "Companionship",
            Self::Admin => "Light Admin",
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Tech => "TECH",
            Self::Grocery => "GROCERY",
            Self::Garden => "GARDEN",
            Self::Social => "SOCIAL",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskCategory {
    type Err = ParseCategoryError;

    /// Accepts the display label or the short keyword, ignoring case and
    /// surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| {
                c.label().eq_ignore_ascii_case(wanted) || c.keyword().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Error returned when a string names none of the five task categories.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task category: {0}")]
pub struct ParseCategoryError(pub String);

/// A registered participant. Read-only for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    pub credits: u32,
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub is_verified: bool,
}

/// Headline figures for the administrator dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityImpact {
    /// Number of tasks ever posted.
    pub total_tasks: usize,
    /// Distinct volunteers that have been assigned at least one task.
    pub active_teens: usize,
    /// Distinct residents that have requested at least one task.
    pub active_elders: usize,
    /// Sum of credit values over verified tasks.
    pub credits_distributed: u64,
    /// Tasks still waiting for a volunteer.
    pub pending_tasks: usize,
}

/// Number of tasks in one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: TaskCategory,
    pub count: usize,
}
