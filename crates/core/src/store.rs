//! Dual-mode task store
//!
//! Holds the in-memory task list and runs every mutation against the
//! backing store selected by the current [`Mode`]:
//!
//! - Guest mode writes the whole list through to the expiring local store
//!   while the state lock is held, so memory and storage never diverge.
//! - Authenticated mode applies the change in memory first, releases the
//!   lock, awaits the remote call, then confirms or rolls back.
//!
//! Rollback snapshots are taken before the lock is released. Two overlapping
//! remote mutations can therefore undo each other's optimistic change when
//! the later one fails; that is accepted rather than serialized.
//!
//! Every mode transition bumps a generation counter. A remote response that
//! comes back under a different generation belongs to a previous session and
//! is dropped without touching the list.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::local::ExpiringStore;
use crate::mode::Mode;
use crate::task::{
    decode_collection, encode_collection, normalize_text, retain_valid_records, NewTask,
    RemoteTaskCollection, Task, TaskPatch, TaskPriority,
};
use crate::view::{project, SortKey, TaskFilter};
use crate::Result;

const GUEST_SUFFIX: &str = " (Guest Mode)";

/// Where and for how long guest tasks are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestStorage {
    pub key: String,
    pub ttl_days: u32,
}

/// Backing store a mutation runs against, captured under the lock
enum Backing {
    Guest,
    Remote { owner_id: String, generation: u64 },
}

#[derive(Debug)]
struct StoreState {
    mode: Mode,
    generation: u64,
    tasks: Vec<Task>,
    status: String,
}

impl StoreState {
    fn backing(&self) -> Result<Backing> {
        match &self.mode {
            Mode::Anonymous => Err(Error::InvalidMode(
                "sign in or continue as guest first".into(),
            )),
            Mode::Guest => Ok(Backing::Guest),
            Mode::Authenticated(identity) => Ok(Backing::Remote {
                owner_id: identity.owner_id.clone(),
                generation: self.generation,
            }),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    /// Record a failure on the status line and hand the error back.
    fn fail(&mut self, status: &str, err: Error) -> Error {
        self.status = match &err {
            Error::InvalidMode(_) => "Please log in or continue as Guest".to_string(),
            Error::Validation(message) => message.clone(),
            _ => status.to_string(),
        };
        err
    }

    fn succeed(&mut self, status: &str, guest: bool) {
        self.status = if guest {
            format!("{}{}", status, GUEST_SUFFIX)
        } else {
            status.to_string()
        };
    }
}

/// In-memory task list bound to whichever backing store is active
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Inner>,
}

struct Inner {
    remote: Arc<dyn RemoteTaskCollection>,
    local: Arc<dyn ExpiringStore>,
    guest: GuestStorage,
    state: RwLock<StoreState>,
}

impl TaskStore {
    /// Create a store in anonymous mode with an empty list
    pub fn new(
        remote: Arc<dyn RemoteTaskCollection>,
        local: Arc<dyn ExpiringStore>,
        guest: GuestStorage,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                remote,
                local,
                guest,
                state: RwLock::new(StoreState {
                    mode: Mode::Anonymous,
                    generation: 0,
                    tasks: Vec::new(),
                    status: "Loading application...".to_string(),
                }),
            }),
        }
    }

    /// Snapshot of the list in store order (newest additions first)
    pub async fn tasks(&self) -> Vec<Task> {
        self.inner.state.read().await.tasks.clone()
    }

    pub async fn mode(&self) -> Mode {
        self.inner.state.read().await.mode.clone()
    }

    /// Human-readable outcome of the last operation
    pub async fn status(&self) -> String {
        self.inner.state.read().await.status.clone()
    }

    pub async fn set_status(&self, status: impl Into<String>) {
        self.inner.state.write().await.status = status.into();
    }

    /// Filtered, sorted view of the current list
    pub async fn view(&self, filter: TaskFilter, sort: SortKey) -> Vec<Task> {
        let state = self.inner.state.read().await;
        project(&state.tasks, filter, sort)
    }

    /// Switch to a new mode: drop the list and reload from the new backing store.
    pub async fn on_mode_change(&self, mode: Mode) -> Result<()> {
        {
            let mut state = self.inner.state.write().await;
            state.generation += 1;
            state.tasks.clear();
            state.status = match &mode {
                Mode::Anonymous => "Please log in or continue as Guest".to_string(),
                Mode::Guest => "Guest Mode".to_string(),
                Mode::Authenticated(_) => "Loading tasks...".to_string(),
            };
            info!("Task store switched to {} mode", mode.as_str());
            state.mode = mode;
            if state.mode.is_anonymous() {
                return Ok(());
            }
        }
        self.load().await
    }

    /// Replace the list with the full collection from the active backing store.
    pub async fn load(&self) -> Result<()> {
        let (owner_id, generation) = {
            let mut state = self.inner.state.write().await;
            match state.backing() {
                Err(e) => return Err(state.fail("Failed to load tasks", e)),
                Ok(Backing::Guest) => return self.load_guest(&mut state),
                Ok(Backing::Remote {
                    owner_id,
                    generation,
                }) => (owner_id, generation),
            }
        };

        debug!("Loading remote tasks for owner {}", owner_id);
        let result = self.inner.remote.list(&owner_id).await;

        let mut state = self.inner.state.write().await;
        if state.generation != generation {
            debug!("Ignoring task list for owner {} from a previous session", owner_id);
            return Ok(());
        }

        match result {
            Ok(tasks) => {
                let count = tasks.len();
                state.tasks = retain_valid_records(tasks)
                    .into_iter()
                    .map(|task| Task {
                        owner_id: Some(owner_id.clone()),
                        ..task
                    })
                    .collect();
                if state.tasks.len() != count {
                    warn!(
                        "Dropped {} remote task(s) with blank text or duplicate ids",
                        count - state.tasks.len()
                    );
                }
                let name = match &state.mode {
                    Mode::Authenticated(identity) => identity.display_name().to_string(),
                    _ => owner_id.clone(),
                };
                state.status = format!("Logged in as {}", name);
                info!("Loaded {} remote task(s)", state.tasks.len());
                Ok(())
            }
            Err(e) => {
                error!("Error fetching tasks: {}", e);
                state.tasks.clear();
                Err(state.fail(
                    "Failed to load tasks from server",
                    e.into_backing_store(),
                ))
            }
        }
    }

    fn load_guest(&self, state: &mut StoreState) -> Result<()> {
        let raw = match self.inner.local.read(&self.inner.guest.key) {
            Ok(raw) => raw,
            Err(e) => {
                state.tasks.clear();
                return Err(state.fail("Failed to load guest tasks", e));
            }
        };

        match raw.as_deref().map(decode_collection).transpose() {
            Ok(tasks) => {
                state.tasks = tasks.unwrap_or_default();
                state.status = "Guest Mode".to_string();
                info!("Loaded {} guest task(s)", state.tasks.len());
                Ok(())
            }
            Err(e) => {
                warn!("Guest data is corrupt, resetting it: {}", e);
                state.tasks.clear();
                self.persist_guest(&state.tasks)?;
                state.status = "Guest data was unreadable and has been reset".to_string();
                Err(e)
            }
        }
    }

    fn persist_guest(&self, tasks: &[Task]) -> Result<()> {
        let raw = encode_collection(tasks)?;
        self.inner
            .local
            .write(&self.inner.guest.key, &raw, self.inner.guest.ttl_days)
    }

    /// Add a task at the top of the list.
    ///
    /// The task is visible immediately. With a remote backing store it is
    /// replaced in place by the stored representation once confirmed, or
    /// removed again if the insert fails.
    pub async fn add(&self, text: &str, priority: TaskPriority) -> Result<Task> {
        let (task, owner_id, generation) = {
            let mut state = self.inner.state.write().await;
            let text = match normalize_text(text) {
                Ok(text) => text,
                Err(e) => return Err(state.fail("Failed to add task", e)),
            };
            let backing = match state.backing() {
                Ok(backing) => backing,
                Err(e) => return Err(state.fail("Failed to add task", e)),
            };

            let mut task = Task::new(text).with_priority(priority);
            if let Backing::Remote { owner_id, .. } = &backing {
                task = task.with_owner(owner_id.clone());
            }
            state.tasks.insert(0, task.clone());
            debug!("Added task {} optimistically", task.id);

            match backing {
                Backing::Guest => {
                    if let Err(e) = self.persist_guest(&state.tasks) {
                        warn!("Rolling back task {}: {}", task.id, e);
                        state.tasks.retain(|t| t.id != task.id);
                        return Err(state.fail("Failed to add task", e));
                    }
                    state.succeed("Task added successfully", true);
                    return Ok(task);
                }
                Backing::Remote {
                    owner_id,
                    generation,
                } => (task, owner_id, generation),
            }
        };

        let result = self
            .inner
            .remote
            .insert(&owner_id, &NewTask::from(&task))
            .await;

        let mut state = self.inner.state.write().await;
        if state.generation != generation {
            debug!("Ignoring insert response for task {} from a previous session", task.id);
            return result.map_err(Error::into_backing_store);
        }

        match result {
            Ok(mut stored) => {
                if stored.owner_id.is_none() {
                    stored.owner_id = Some(owner_id);
                }
                if let Some(index) = state.position(&task.id) {
                    state.tasks[index] = stored.clone();
                }
                state.succeed("Task added successfully", false);
                Ok(stored)
            }
            Err(e) => {
                error!("Error adding task: {}", e);
                warn!("Rolling back task {}", task.id);
                state.tasks.retain(|t| t.id != task.id);
                Err(state.fail("Failed to add task", e.into_backing_store()))
            }
        }
    }

    /// Apply a partial update to one task.
    ///
    /// The new record is visible immediately. A remote failure restores the
    /// list captured right before the change.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let (updated, patch, snapshot, owner_id, generation) = {
            let mut state = self.inner.state.write().await;
            let patch = match patch.normalized() {
                Ok(patch) => patch,
                Err(e) => return Err(state.fail("Failed to update task", e)),
            };
            let backing = match state.backing() {
                Ok(backing) => backing,
                Err(e) => return Err(state.fail("Failed to update task", e)),
            };
            let Some(index) = state.position(id) else {
                return Err(state.fail(
                    "Failed to update task",
                    Error::TaskNotFound(id.to_string()),
                ));
            };

            let snapshot = state.tasks.clone();
            let updated = state.tasks[index].apply(&patch);
            if patch.is_empty() {
                return Ok(updated);
            }
            state.tasks[index] = updated.clone();
            debug!("Updated task {} optimistically", id);

            match backing {
                Backing::Guest => {
                    if let Err(e) = self.persist_guest(&state.tasks) {
                        warn!("Rolling back update of task {}: {}", id, e);
                        state.tasks = snapshot;
                        return Err(state.fail("Failed to update task", e));
                    }
                    state.succeed("Task updated successfully", true);
                    return Ok(updated);
                }
                Backing::Remote {
                    owner_id,
                    generation,
                } => (updated, patch, snapshot, owner_id, generation),
            }
        };

        let result = self.inner.remote.update(id, &owner_id, &patch).await;

        let mut state = self.inner.state.write().await;
        if state.generation != generation {
            debug!("Ignoring update response for task {} from a previous session", id);
            return result.map(|_| updated).map_err(Error::into_backing_store);
        }

        match result {
            Ok(()) => {
                state.succeed("Task updated successfully", false);
                Ok(updated)
            }
            Err(e) => {
                error!("Error updating task: {}", e);
                warn!("Rolling back update of task {}", id);
                state.tasks = snapshot;
                Err(state.fail("Failed to update task", e.into_backing_store()))
            }
        }
    }

    /// Remove a task, returning the removed record.
    pub async fn delete(&self, id: &str) -> Result<Task> {
        let (removed, snapshot, owner_id, generation) = {
            let mut state = self.inner.state.write().await;
            let backing = match state.backing() {
                Ok(backing) => backing,
                Err(e) => return Err(state.fail("Failed to delete task", e)),
            };
            let Some(index) = state.position(id) else {
                return Err(state.fail(
                    "Failed to delete task",
                    Error::TaskNotFound(id.to_string()),
                ));
            };

            let snapshot = state.tasks.clone();
            let removed = state.tasks.remove(index);
            debug!("Deleted task {} optimistically", id);

            match backing {
                Backing::Guest => {
                    if let Err(e) = self.persist_guest(&state.tasks) {
                        warn!("Rolling back delete of task {}: {}", id, e);
                        state.tasks = snapshot;
                        return Err(state.fail("Failed to delete task", e));
                    }
                    state.succeed("Task deleted successfully", true);
                    return Ok(removed);
                }
                Backing::Remote {
                    owner_id,
                    generation,
                } => (removed, snapshot, owner_id, generation),
            }
        };

        let result = self.inner.remote.delete(id, &owner_id).await;

        let mut state = self.inner.state.write().await;
        if state.generation != generation {
            debug!("Ignoring delete response for task {} from a previous session", id);
            return result.map(|_| removed).map_err(Error::into_backing_store);
        }

        match result {
            Ok(()) => {
                state.succeed("Task deleted successfully", false);
                Ok(removed)
            }
            Err(e) => {
                error!("Error deleting task: {}", e);
                warn!("Rolling back delete of task {}", id);
                state.tasks = snapshot;
                Err(state.fail("Failed to delete task", e.into_backing_store()))
            }
        }
    }
}
