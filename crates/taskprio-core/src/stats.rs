//! Aggregate task statistics.

use crate::{Task, TaskStatus, TaskType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts over a snapshot of the task store. Derived, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub by_type: BTreeMap<TaskType, u64>,
    pub by_priority: BTreeMap<i32, u64>,
}

impl TaskStats {
    /// Fold a set of tasks into stats. Every task type is present, even at zero.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = Self {
            by_type: TaskType::ALL.iter().map(|t| (*t, 0)).collect(),
            ..Self::default()
        };

        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Processing => stats.processing += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
            *stats.by_type.entry(task.task_type).or_insert(0) += 1;
            *stats.by_priority.entry(task.priority).or_insert(0) += 1;
        }

        stats
    }

    /// Count for a single status.
    pub fn count(&self, status: TaskStatus) -> u64 {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Processing => self.processing,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
        }
    }
}
