//! Dashboard aggregation over a task snapshot.

use genbridge_types::{CategoryCount, CommunityImpact, Task, TaskCategory, TaskStatus};
use std::collections::HashSet;

/// Computes the dashboard headline figures.
pub fn impact(tasks: &[Task]) -> CommunityImpact {
    let helpers: HashSet<&str> = tasks.iter().filter_map(|t| t.helper_id.as_deref()).collect();
    let requesters: HashSet<&str> = tasks.iter().map(|t| t.requester_id.as_str()).collect();

    CommunityImpact {
        total_tasks: tasks.len(),
        active_teens: helpers.len(),
        active_elders: requesters.len(),
        credits_distributed: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Verified)
            .map(|t| u64::from(t.credit_value))
            .sum(),
        pending_tasks: tasks.iter().filter(|t| t.status == TaskStatus::Open).count(),
    }
}

/// Task counts per category, one entry per category in display order.
pub fn category_counts(tasks: &[Task]) -> Vec<CategoryCount> {
    TaskCategory::ALL
        .into_iter()
        .map(|category| CategoryCount {
            category,
            count: tasks.iter().filter(|t| t.category == category).count(),
        })
        .collect()
}

/// Compact `Category: STATUS` listing used as input for the impact summary.
pub fn task_digest(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(|t| format!("{}: {}", t.category, t.status))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::demo_tasks;

    #[test]
    fn demo_data_impact() {
        let mut tasks = demo_tasks(0);
        tasks[2].status = TaskStatus::Verified;

        let stats = impact(&tasks);
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.active_teens, 1);
        assert_eq!(stats.active_elders, 1);
        assert_eq!(stats.credits_distributed, 40);
        assert_eq!(stats.pending_tasks, 1);
    }

    #[test]
    fn empty_snapshot_is_all_zero() {
        assert_eq!(impact(&[]), CommunityImpact::default());
        assert!(category_counts(&[]).iter().all(|c| c.count == 0));
        assert_eq!(task_digest(&[]), "");
    }

    #[test]
    fn category_counts_cover_every_category() {
        let counts = category_counts(&demo_tasks(0));
        assert_eq!(counts.len(), 5);
        assert_eq!(counts[0], CategoryCount { category: TaskCategory::Tech, count: 1 });
        assert_eq!(counts[3], CategoryCount { category: TaskCategory::Social, count: 0 });
    }

    #[test]
    fn digest_lists_category_and_status() {
        assert_eq!(
            task_digest(&demo_tasks(0)),
            "Tech Support: OPEN, Grocery Shopping: IN_PROGRESS, Garden Help: COMPLETED"
        );
    }
}
