//! Task model definitions

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::Result;

/// Task priority level, ordered Low < Medium < High
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Position in the fixed enumeration; higher is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(Error::Validation(format!(
                "Unsupported priority '{}'",
                value
            ))),
        }
    }
}

/// A single entry of the task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, deserialize_with = "priority_or_default")]
    pub priority: TaskPriority,
    /// Absent when a stored record carried no usable timestamp
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "user_id",
        alias = "owner_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_id: Option<String>,
}

impl Task {
    /// Create a new task with a client-generated id and the current time.
    ///
    /// The text is taken as given; callers validate it with [`normalize_text`].
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            completed: false,
            priority: TaskPriority::default(),
            created_at: Some(Utc::now()),
            owner_id: None,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the owning account
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Creation time, with a missing timestamp treated as the epoch.
    pub fn created_at_or_epoch(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or_default()
    }

    /// Return a copy with the patch applied. The id and creation time never change.
    pub fn apply(&self, patch: &TaskPatch) -> Task {
        let mut next = self.clone();
        if let Some(text) = &patch.text {
            next.text = text.clone();
        }
        if let Some(completed) = patch.completed {
            next.completed = completed;
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        next
    }
}

/// Fields sent to the remote collection when inserting a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub text: String,
    pub completed: bool,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Task> for NewTask {
    fn from(task: &Task) -> Self {
        Self {
            text: task.text.clone(),
            completed: task.completed,
            priority: task.priority,
            created_at: task.created_at,
        }
    }
}

/// Partial update of a task; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
}

impl TaskPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none() && self.priority.is_none()
    }

    /// Trim the text field and reject it if nothing is left.
    pub fn normalized(mut self) -> Result<Self> {
        if let Some(text) = self.text.take() {
            self.text = Some(normalize_text(&text)?);
        }
        Ok(self)
    }
}

/// Trim task text, rejecting empty or whitespace-only input.
pub fn normalize_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("Task cannot be empty.".into()));
    }
    Ok(trimmed.to_string())
}

/// Clean up records loaded from a backing store.
///
/// Text is trimmed and records left with blank text are dropped, then
/// records whose id repeats an earlier one are dropped, keeping the first.
pub fn retain_valid_records(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter_map(|task| {
            let text = normalize_text(&task.text).ok()?;
            Some(Task { text, ..task })
        })
        .filter(|task| seen.insert(task.id.clone()))
        .collect()
}

// Older guest data used millisecond timestamps as ids.
fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(D::Error::custom(format!("invalid task id: {}", other))),
    }
}

fn priority_or_default<'de, D>(deserializer: D) -> std::result::Result<TaskPriority, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|value| value.parse().ok())
        .unwrap_or_default())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Some(Value::Number(millis)) => millis
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    })
}
