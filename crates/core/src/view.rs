//! View projection
//!
//! Pure filtering and sorting of a task list for display. Nothing here
//! mutates its input, and equal inputs always give equal output.

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::warn;

use crate::error::Error;
use crate::task::Task;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TaskFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Active => !task.completed,
            Self::Completed => task.completed,
        }
    }
}

impl FromStr for TaskFilter {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" | "done" => Ok(Self::Completed),
            _ => Err(Error::Validation(format!("Unsupported filter '{}'", value))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedDesc,
    CreatedAsc,
    AlphaAsc,
    AlphaDesc,
    PriorityDesc,
    PriorityAsc,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedDesc => "created-desc",
            Self::CreatedAsc => "created-asc",
            Self::AlphaAsc => "alpha-asc",
            Self::AlphaDesc => "alpha-desc",
            Self::PriorityDesc => "priority-desc",
            Self::PriorityAsc => "priority-asc",
        }
    }

    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            Self::CreatedDesc => b.created_at_or_epoch().cmp(&a.created_at_or_epoch()),
            Self::CreatedAsc => a.created_at_or_epoch().cmp(&b.created_at_or_epoch()),
            Self::AlphaAsc => collate(&a.text, &b.text),
            Self::AlphaDesc => collate(&b.text, &a.text),
            Self::PriorityDesc => b.priority.rank().cmp(&a.priority.rank()),
            Self::PriorityAsc => a.priority.rank().cmp(&b.priority.rank()),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().replace('_', "-").as_str() {
            "created-desc" | "newest" => Ok(Self::CreatedDesc),
            "created-asc" | "oldest" => Ok(Self::CreatedAsc),
            "alpha-asc" => Ok(Self::AlphaAsc),
            "alpha-desc" => Ok(Self::AlphaDesc),
            "priority-desc" => Ok(Self::PriorityDesc),
            "priority-asc" => Ok(Self::PriorityAsc),
            _ => Err(Error::Validation(format!("Unsupported sort key '{}'", value))),
        }
    }
}

/// Filter and sort `tasks` into a new list.
///
/// The sort is stable, so tasks that compare equal keep their store order.
pub fn project(tasks: &[Task], filter: TaskFilter, sort: SortKey) -> Vec<Task> {
    let mut view: Vec<Task> = tasks
        .iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect();
    view.sort_by(|a, b| sort.compare(a, b));
    view
}

fn collator() -> Option<&'static CollatorBorrowed<'static>> {
    static COLLATOR: OnceLock<Option<CollatorBorrowed<'static>>> = OnceLock::new();
    COLLATOR
        .get_or_init(
            || match Collator::try_new(Default::default(), CollatorOptions::default()) {
                Ok(collator) => Some(collator),
                Err(e) => {
                    warn!("Text collation unavailable, sorting by code point: {}", e);
                    None
                }
            },
        )
        .as_ref()
}

/// Locale-aware text comparison using the root collation order.
fn collate(a: &str, b: &str) -> Ordering {
    match collator() {
        Some(collator) => collator.compare(a, b),
        None => a.cmp(b),
    }
}
