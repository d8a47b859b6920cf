//! Read-only user lookup.

use genbridge_types::User;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable directory of known users, in registration order.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Arc<Vec<User>>,
    by_id: Arc<HashMap<String, usize>>,
}

impl UserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        let by_id = users
            .iter()
            .enumerate()
            .map(|(idx, u)| (u.id.clone(), idx))
            .collect();
        Self {
            users: Arc::new(users),
            by_id: Arc::new(by_id),
        }
    }

    pub fn get(&self, id: &str) -> Option<&User> {
        self.by_id.get(id).map(|&idx| &self.users[idx])
    }

    pub fn all(&self) -> &[User] {
        &self.users
    }
}
