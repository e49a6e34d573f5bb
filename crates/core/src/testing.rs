//! Test doubles shared by the unit tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::error::Error;
use crate::task::{NewTask, RemoteTaskCollection, Task, TaskPatch};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    List,
    Insert,
    Update,
    Delete,
}

/// In-memory remote collection with scriptable failures
#[derive(Default)]
pub(crate) struct FakeRemote {
    records: Mutex<HashMap<String, Vec<Task>>>,
    failing: Mutex<HashSet<Op>>,
    calls: Mutex<Vec<(Op, String)>>,
    next_id: AtomicU64,
    gate: Arc<RwLock<()>>,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seed(&self, owner_id: &str, tasks: Vec<Task>) {
        self.records
            .lock()
            .unwrap()
            .insert(owner_id.to_string(), tasks);
    }

    pub(crate) fn tasks(&self, owner_id: &str) -> Vec<Task> {
        self.records
            .lock()
            .unwrap()
            .get(owner_id)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn fail(&self, op: Op, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(op);
        } else {
            set.remove(&op);
        }
    }

    /// Every (operation, owner) pair seen so far
    pub(crate) fn calls(&self) -> Vec<(Op, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Keep every call suspended until the guard is dropped
    pub(crate) async fn hold(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.gate).write_owned().await
    }

    async fn enter(&self, op: Op, owner_id: &str) -> Result<()> {
        let _pass = self.gate.read().await;
        self.calls
            .lock()
            .unwrap()
            .push((op, owner_id.to_string()));
        if self.failing.lock().unwrap().contains(&op) {
            return Err(Error::BackingStore(format!("{:?} rejected by fake remote", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTaskCollection for FakeRemote {
    async fn list(&self, owner_id: &str) -> Result<Vec<Task>> {
        self.enter(Op::List, owner_id).await?;
        Ok(self.tasks(owner_id))
    }

    async fn insert(&self, owner_id: &str, task: &NewTask) -> Result<Task> {
        self.enter(Op::Insert, owner_id).await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = Task {
            id: format!("remote-{}", id),
            text: task.text.clone(),
            completed: task.completed,
            priority: task.priority,
            created_at: task.created_at,
            owner_id: Some(owner_id.to_string()),
        };
        self.records
            .lock()
            .unwrap()
            .entry(owner_id.to_string())
            .or_default()
            .insert(0, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &str, owner_id: &str, patch: &TaskPatch) -> Result<()> {
        self.enter(Op::Update, owner_id).await?;
        let mut records = self.records.lock().unwrap();
        let task = records
            .get_mut(owner_id)
            .and_then(|tasks| tasks.iter_mut().find(|t| t.id == id))
            .ok_or_else(|| Error::BackingStore(format!("no row {}", id)))?;
        *task = task.apply(patch);
        Ok(())
    }

    async fn delete(&self, id: &str, owner_id: &str) -> Result<()> {
        self.enter(Op::Delete, owner_id).await?;
        if let Some(tasks) = self.records.lock().unwrap().get_mut(owner_id) {
            tasks.retain(|t| t.id != id);
        }
        Ok(())
    }
}

/// Yield to spawned tasks until `done` resolves to true.
pub(crate) async fn settle<F, Fut>(mut done: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if done().await {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
