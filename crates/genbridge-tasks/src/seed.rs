//! Demo users and tasks loaded at startup when seeding is enabled.

use genbridge_types::{Task, TaskCategory, TaskStatus, User, UserRole};

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Default requester for tasks posted by someone who is not an elder.
pub const DEMO_ELDER_ID: &str = "e1";

/// The three demo accounts: one volunteer, one resident, one administrator.
pub fn demo_users() -> Vec<User> {
    vec![
        User {
            id: "t1".to_string(),
            name: "Leo Chen".to_string(),
            role: UserRole::Teen,
            credits: 450,
            avatar: "https://picsum.photos/seed/t1/150/150".to_string(),
            bio: Some("11th grader at Westside High. Love tech and chess.".to_string()),
            is_verified: true,
        },
        User {
            id: DEMO_ELDER_ID.to_string(),
            name: "Margaret Wilson".to_string(),
            role: UserRole::Elder,
            credits: 100,
            avatar: "https://picsum.photos/seed/e1/150/150".to_string(),
            bio: Some("Retired librarian. Enjoys historical novels and tea.".to_string()),
            is_verified: true,
        },
        User {
            id: "a1".to_string(),
            name: "City Manager Sarah".to_string(),
            role: UserRole::Admin,
            credits: 0,
            avatar: "https://picsum.photos/seed/a1/150/150".to_string(),
            bio: None,
            is_verified: true,
        },
    ]
}

/// Three demo tasks at different lifecycle stages, timestamped relative to
/// `now_ms`.
pub fn demo_tasks(now_ms: i64) -> Vec<Task> {
    vec![
        Task {
            id: "task-1".to_string(),
            title: "iPad Email Setup".to_string(),
            description:
                "I need help setting up my new iPad to receive emails from my grandkids."
                    .to_string(),
            category: TaskCategory::Tech,
            requester_id: DEMO_ELDER_ID.to_string(),
            helper_id: None,
            status: TaskStatus::Open,
            credit_value: 50,
            location: "Maple Street Community Center".to_string(),
            created_at: now_ms - 24 * HOUR_MS,
        },
        Task {
            id: "task-2".to_string(),
            title: "Weekly Grocery Run".to_string(),
            description:
                "Looking for someone to pick up a few heavy items from the corner market."
                    .to_string(),
            category: TaskCategory::Grocery,
            requester_id: DEMO_ELDER_ID.to_string(),
            helper_id: Some("t1".to_string()),
            status: TaskStatus::InProgress,
            credit_value: 30,
            location: "North 4th Street".to_string(),
            created_at: now_ms - 12 * HOUR_MS,
        },
        Task {
            id: "task-3".to_string(),
            title: "Light Weeding".to_string(),
            description: "Small flower bed needs some attention before the sun gets too hot."
                .to_string(),
            category: TaskCategory::Garden,
            requester_id: DEMO_ELDER_ID.to_string(),
            helper_id: Some("t1".to_string()),
            status: TaskStatus::Completed,
            credit_value: 40,
            location: "Oak Avenue".to_string(),
            created_at: now_ms - 48 * HOUR_MS,
        },
    ]
}
