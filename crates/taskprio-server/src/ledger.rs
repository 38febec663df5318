//! Priority ledger - the only write path for `Task::priority`.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::info;

use taskprio_core::{ChangeReason, Page, Pagination, PriorityLogEntry, Task, TaskId};

#[derive(Default)]
struct LedgerInner {
    entries: Vec<PriorityLogEntry>,
    by_task: HashMap<TaskId, Vec<usize>>,
}

/// Append-only log of priority changes.
pub struct PriorityLedger {
    inner: RwLock<LedgerInner>,
}

impl PriorityLedger {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerInner::default()),
        }
    }

    /// Set a task's priority and record the change.
    ///
    /// The caller holds the task's lock, so the entry's `old_priority` is
    /// the value that was actually replaced. Returns `None` (and writes
    /// nothing) when the priority is unchanged.
    pub async fn commit(
        &self,
        task: &mut Task,
        new_priority: i32,
        reason: &ChangeReason,
    ) -> Option<PriorityLogEntry> {
        let old_priority = task.priority;
        if old_priority == new_priority {
            return None;
        }

        task.priority = new_priority;
        task.updated_at = chrono::Utc::now();

        let entry = self
            .record(task.id.clone(), old_priority, new_priority, reason)
            .await;
        Some(entry)
    }

    /// Append one entry.
    pub async fn record(
        &self,
        task_id: TaskId,
        old_priority: i32,
        new_priority: i32,
        reason: &ChangeReason,
    ) -> PriorityLogEntry {
        let entry = PriorityLogEntry::new(task_id, old_priority, new_priority, reason);

        let mut inner = self.inner.write().await;
        let index = inner.entries.len();
        inner.entries.push(entry.clone());
        inner
            .by_task
            .entry(entry.task_id.clone())
            .or_default()
            .push(index);
        drop(inner);

        info!(
            task_id = %entry.task_id,
            old_priority = entry.old_priority,
            new_priority = entry.new_priority,
            reason = %entry.reason,
            "Priority changed"
        );
        entry
    }

    /// Every entry for one task, oldest first.
    pub async fn list_by_task(&self, task_id: &TaskId) -> Vec<PriorityLogEntry> {
        let inner = self.inner.read().await;
        inner
            .by_task
            .get(task_id)
            .map(|indices| indices.iter().map(|i| inner.entries[*i].clone()).collect())
            .unwrap_or_default()
    }

    /// One page of a task's entries, oldest first.
    pub async fn page_by_task(
        &self,
        task_id: &TaskId,
        pagination: &Pagination,
        default_size: usize,
        max_size: usize,
    ) -> Page<PriorityLogEntry> {
        pagination.paginate(self.list_by_task(task_id).await, default_size, max_size)
    }

    /// Total number of entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

impl Default for PriorityLedger {
    fn default() -> Self {
        Self::new()
    }
}
