//! Remote task collection trait
//!
//! Defines the interface to the remote record store. Every call is scoped to
//! the owner that is signed in.

use async_trait::async_trait;

use super::model::{NewTask, Task, TaskPatch};
use crate::Result;

/// Remote CRUD collection of task records, keyed by owner
#[async_trait]
pub trait RemoteTaskCollection: Send + Sync {
    /// List every task belonging to the owner
    async fn list(&self, owner_id: &str) -> Result<Vec<Task>>;

    /// Insert a task and return the stored representation
    async fn insert(&self, owner_id: &str, task: &NewTask) -> Result<Task>;

    /// Apply a partial update to the owner's task
    async fn update(&self, id: &str, owner_id: &str, patch: &TaskPatch) -> Result<()>;

    /// Delete the owner's task
    async fn delete(&self, id: &str, owner_id: &str) -> Result<()>;
}
