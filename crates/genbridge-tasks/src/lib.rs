//! In-memory task store and user directory for the GenBridge platform.
//!
//! All state lives for the lifetime of the process only. The store is a
//! cheaply cloneable handle around a lock-protected vector ordered newest
//! first; every mutation bumps a revision counter so that derived data
//! (such as the dashboard summary) can be cached against it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use genbridge_tasks::{seed, TaskStore};
//! use genbridge_types::TaskAction;
//!
//! let store = TaskStore::with_tasks(seed::demo_tasks(now_ms));
//! let task = store.apply_action("task-1", TaskAction::Accept, "t1")?;
//! ```

mod error;
mod impact;
pub mod seed;
mod store;
mod users;

pub use error::TaskError;
pub use impact::{category_counts, impact, task_digest};
pub use store::TaskStore;
pub use users::UserDirectory;
