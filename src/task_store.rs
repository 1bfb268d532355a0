use std::fmt;

use chrono::NaiveDate;
use log::{info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::response_parser::PriorityItem;

/// Stable per-session identifier, assigned at insertion.
pub type TaskId = u32;

/// Priority levels in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum PriorityLevel {
    High,
    Medium,
    Low,
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityLevel::High => write!(f, "High"),
            PriorityLevel::Medium => write!(f, "Medium"),
            PriorityLevel::Low => write!(f, "Low"),
        }
    }
}

/// One row of the to-do list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task: String,
    pub created: NaiveDate,
    pub deadline: Option<String>,
    pub priority: Option<PriorityLevel>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("task already exists: {0}")]
    DuplicateTask(String),
}

/// Outcome of merging one recommendation into the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Records whose priority was written, in merge order
    pub updated: Vec<TaskId>,
    /// Task names of items that matched no record
    pub unmatched: Vec<String>,
}

/// Titles are compared trimmed and case-insensitively.
fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// In-memory ordered table of task records.
#[derive(Debug)]
pub struct TaskStore {
    records: Vec<TaskRecord>,
    next_id: TaskId,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    #[cfg(test)]
    pub fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains_title(&self, title: &str) -> bool {
        let wanted = normalize_title(title);
        self.records.iter().any(|r| normalize_title(&r.task) == wanted)
    }

    /// Append a record; rejects a title that already exists.
    pub fn insert(
        &mut self,
        task: String,
        deadline: Option<String>,
        created: NaiveDate,
    ) -> Result<TaskId, StoreError> {
        if self.contains_title(&task) {
            return Err(StoreError::DuplicateTask(task));
        }

        let id = self.next_id;
        self.next_id += 1;
        info!("Added task {} ({:?}, deadline {:?})", id, task, deadline);
        self.records.push(TaskRecord {
            id,
            task,
            created,
            deadline,
            priority: None,
        });
        Ok(id)
    }

    /// Write each item's priority onto its record, then re-sort.
    ///
    /// Items are matched by id; an id that names no record falls back to
    /// exact task-name equality.
    pub fn apply(&mut self, items: &[PriorityItem]) -> MergeReport {
        let mut report = MergeReport::default();

        for item in items {
            let mut matched: Vec<TaskId> = self
                .records
                .iter()
                .filter(|r| r.id == item.id)
                .map(|r| r.id)
                .collect();

            if matched.is_empty() {
                matched = self
                    .records
                    .iter()
                    .filter(|r| r.task == item.task)
                    .map(|r| r.id)
                    .collect();
                if !matched.is_empty() {
                    warn!(
                        "Recommendation id {} is unknown, matched {:?} by name",
                        item.id, item.task
                    );
                }
            }

            if matched.is_empty() {
                warn!("Recommendation for {:?} (id {}) matches no task", item.task, item.id);
                report.unmatched.push(item.task.clone());
                continue;
            }

            for record in self.records.iter_mut().filter(|r| matched.contains(&r.id)) {
                record.priority = Some(item.priority);
                if !report.updated.contains(&record.id) {
                    report.updated.push(record.id);
                }
            }
        }

        self.sort_by_priority();
        report
    }

    /// Stable sort: High, Medium, Low, then unset.
    pub fn sort_by_priority(&mut self) {
        self.records
            .sort_by_key(|r| (r.priority.is_none(), r.priority));
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
