//! In-memory task store with per-task locks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use taskprio_core::{CoreError, Task, TaskFilter, TaskId, TaskStats};

/// Shared handle to one task. Holding the lock serializes priority writes.
pub type TaskHandle = Arc<Mutex<Task>>;

struct TaskSlot {
    /// Insertion sequence, used for stable scan order.
    seq: u64,
    task: TaskHandle,
}

/// Holds every task record.
///
/// The map lock is only held long enough to clone handles; it is never held
/// while waiting on a task lock.
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, TaskSlot>>,
    next_seq: AtomicU64,
    /// Bumped on every mutation; a cached snapshot is only valid for its generation.
    generation: AtomicU64,
    stats_cache: RwLock<Option<(u64, TaskStats)>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            stats_cache: RwLock::new(None),
        }
    }

    /// Insert a new task. Fails if the id is already taken.
    pub async fn insert(&self, task: Task) -> Result<TaskHandle, CoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(CoreError::InvalidInput(format!(
                "task {} already exists",
                task.id
            )));
        }
        let id = task.id.clone();
        let handle = Arc::new(Mutex::new(task));
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        tasks.insert(
            id,
            TaskSlot {
                seq,
                task: handle.clone(),
            },
        );
        drop(tasks);

        self.invalidate_stats();
        Ok(handle)
    }

    /// Look up a task handle.
    pub async fn get(&self, id: &TaskId) -> Option<TaskHandle> {
        self.tasks.read().await.get(id).map(|slot| slot.task.clone())
    }

    /// Look up a task handle, failing with `TaskNotFound`.
    pub async fn require(&self, id: &TaskId) -> Result<TaskHandle, CoreError> {
        self.get(id)
            .await
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))
    }

    /// Copy of the current task record.
    pub async fn snapshot(&self, id: &TaskId) -> Result<Task, CoreError> {
        let handle = self.require(id).await?;
        let task = handle.lock().await.clone();
        Ok(task)
    }

    pub async fn contains(&self, id: &TaskId) -> bool {
        self.tasks.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Remove a task and return its final state.
    pub async fn remove(&self, id: &TaskId) -> Result<Task, CoreError> {
        let slot = self
            .tasks
            .write()
            .await
            .remove(id)
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))?;
        self.invalidate_stats();

        // Waits for any in-flight priority write on this task.
        let task = slot.task.lock().await.clone();
        Ok(task)
    }

    /// All handles in insertion order.
    pub async fn handles(&self) -> Vec<(TaskId, TaskHandle)> {
        let tasks = self.tasks.read().await;
        let mut slots: Vec<(u64, TaskId, TaskHandle)> = tasks
            .iter()
            .map(|(id, slot)| (slot.seq, id.clone(), slot.task.clone()))
            .collect();
        drop(tasks);

        slots.sort_by_key(|(seq, _, _)| *seq);
        slots.into_iter().map(|(_, id, task)| (id, task)).collect()
    }

    /// Copies of every task, in insertion order.
    pub async fn all(&self) -> Vec<Task> {
        let mut out = Vec::new();
        for (_, handle) in self.handles().await {
            out.push(handle.lock().await.clone());
        }
        out
    }

    /// Tasks matching `filter`, highest priority first, then oldest first.
    pub async fn list(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .all()
            .await
            .into_iter()
            .filter(|task| filter.matches(task))
            .collect();
        tasks.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        tasks
    }

    /// Drop the cached stats snapshot. Called on every mutation.
    pub fn invalidate_stats(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Stats over every task, served from cache while nothing has changed.
    pub async fn stats(&self) -> TaskStats {
        let generation = self.generation.load(Ordering::Acquire);
        if let Some((cached_gen, stats)) = self.stats_cache.read().await.as_ref() {
            if *cached_gen == generation {
                return stats.clone();
            }
        }

        let stats = TaskStats::from_tasks(&self.all().await);

        // A mutation during the scan makes this snapshot stale; don't cache it.
        if self.generation.load(Ordering::Acquire) == generation {
            *self.stats_cache.write().await = Some((generation, stats.clone()));
        }
        stats
    }

    /// Stats over the tasks of one work id. Not cached.
    pub async fn stats_for_work(&self, work_id: &str) -> TaskStats {
        let tasks = self.all().await;
        TaskStats::from_tasks(tasks.iter().filter(|task| task.work_id == work_id))
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskprio_core::{TaskStatus, TaskType};

    #[tokio::test]
    async fn test_insert_and_snapshot() {
        let store = TaskStore::new();
        let task = Task::new(TaskType::Translation, "hola");
        let id = task.id.clone();

        store.insert(task.clone()).await.unwrap();
        assert_eq!(store.snapshot(&id).await.unwrap(), task);
        assert!(store.insert(task).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let store = TaskStore::new();
        let err = store.snapshot(&TaskId::new("nope")).await.unwrap_err();
        assert_eq!(err, CoreError::TaskNotFound("nope".into()));
        assert!(store.remove(&TaskId::new("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_orders_by_priority_then_age() {
        let store = TaskStore::new();
        let low = Task::new(TaskType::Translation, "low").with_priority(1);
        let high = Task::new(TaskType::Translation, "high").with_priority(9);
        let low_later = Task::new(TaskType::Translation, "low later").with_priority(1);
        for task in [low.clone(), high.clone(), low_later.clone()] {
            store.insert(task).await.unwrap();
        }

        let ids: Vec<TaskId> = store
            .list(&TaskFilter::default())
            .await
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![high.id, low.id, low_later.id]);
    }

    #[tokio::test]
    async fn test_handles_keep_insertion_order() {
        let store = TaskStore::new();
        let mut expected = Vec::new();
        for i in 0..5 {
            let task = Task::new(TaskType::ContentGeneration, format!("t{i}"));
            expected.push(task.id.clone());
            store.insert(task).await.unwrap();
        }
        let ids: Vec<TaskId> = store.handles().await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_stats_cache_invalidated_on_mutation() {
        let store = TaskStore::new();
        store
            .insert(Task::new(TaskType::Translation, "a"))
            .await
            .unwrap();
        assert_eq!(store.stats().await.total, 1);
        // Served from cache.
        assert_eq!(store.stats().await.total, 1);

        let second = Task::new(TaskType::Translation, "b").with_status(TaskStatus::Failed);
        let second_id = second.id.clone();
        store.insert(second).await.unwrap();
        let stats = store.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.failed, 1);

        store.remove(&second_id).await.unwrap();
        assert_eq!(store.stats().await.total, 1);
    }

    #[tokio::test]
    async fn test_stats_for_work() {
        let store = TaskStore::new();
        store
            .insert(Task::new(TaskType::Translation, "a").with_work("w1"))
            .await
            .unwrap();
        store
            .insert(Task::new(TaskType::Translation, "b").with_work("w2"))
            .await
            .unwrap();
        assert_eq!(store.stats_for_work("w1").await.total, 1);
        assert_eq!(store.stats_for_work("w3").await.total, 0);
    }
}
