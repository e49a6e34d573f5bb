//! Guest collection encoding
//!
//! The guest collection is stored as one JSON array holding the full,
//! normalized list. It is always rewritten wholesale, never patched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::model::{retain_valid_records, Task, TaskPriority};
use crate::error::Error;
use crate::Result;

#[derive(Serialize)]
struct GuestRecord<'a> {
    id: &'a str,
    text: &'a str,
    completed: bool,
    priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a Task> for GuestRecord<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            id: &task.id,
            text: &task.text,
            completed: task.completed,
            priority: task.priority,
            created_at: task.created_at,
        }
    }
}

/// Serialize the whole collection for the guest store.
pub fn encode_collection(tasks: &[Task]) -> Result<String> {
    let records: Vec<GuestRecord<'_>> = tasks.iter().map(GuestRecord::from).collect();
    Ok(serde_json::to_string(&records)?)
}

/// Parse a stored guest collection.
///
/// Blank input is an empty collection. Anything that is not a JSON array of
/// task records fails with [`Error::CorruptLocalData`]. Records with blank
/// text, or repeating an earlier id, are dropped.
pub fn decode_collection(raw: &str) -> Result<Vec<Task>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let tasks: Vec<Task> =
        serde_json::from_str(raw).map_err(|e| Error::CorruptLocalData(e.to_string()))?;

    let count = tasks.len();
    let mut valid = retain_valid_records(tasks);
    if valid.len() != count {
        warn!(
            "Dropped {} guest task(s) with blank text or duplicate ids",
            count - valid.len()
        );
    }
    for task in &mut valid {
        task.owner_id = None;
    }
    Ok(valid)
}
