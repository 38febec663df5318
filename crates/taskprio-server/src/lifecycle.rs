//! Task lifecycle: creation, status transitions, retry and deletion.
//!
//! Lifecycle operations never write `priority` themselves apart from the
//! initial value at creation; they hand the task to the [`RuleEngine`]
//! whenever its attributes change.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use taskprio_core::{CoreError, Page, Pagination, Task, TaskFilter, TaskId, TaskStatus, TaskType};

use crate::engine::RuleEngine;
use crate::state::AppState;

/// Request to create a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub work_id: String,
    #[serde(default)]
    pub batch_id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub content: String,
    /// Defaults to the configured default priority.
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl NewTask {
    pub fn new(task_type: TaskType, content: impl Into<String>) -> Self {
        Self {
            work_id: String::new(),
            batch_id: String::new(),
            task_type,
            content: content.into(),
            priority: None,
            tags: Vec::new(),
            max_retries: None,
        }
    }
}

/// Request to move a task to a new status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Task operations outside the rule engine.
#[derive(Clone)]
pub struct TaskService {
    state: Arc<AppState>,
    engine: RuleEngine,
}

impl TaskService {
    pub fn new(state: Arc<AppState>) -> Self {
        let engine = RuleEngine::new(state.clone());
        Self { state, engine }
    }

    /// Create a task and run the rules over it.
    pub async fn create(&self, request: NewTask) -> Result<Task, CoreError> {
        let config = &self.state.config;
        let priority = match request.priority {
            Some(priority) => config.bounds.resolve(priority)?,
            None => config.bounds.clamp(config.default_priority),
        };

        let mut task = Task::new(request.task_type, request.content)
            .with_work(request.work_id)
            .with_batch(request.batch_id)
            .with_priority(priority);
        task.tags = request.tags;
        task.max_retries = request.max_retries.unwrap_or(config.default_max_retries);

        let task_id = task.id.clone();
        info!(
            task_id = %task_id,
            task_type = %task.task_type,
            priority,
            "Creating task"
        );
        self.state.store.insert(task).await?;

        let evaluation = self.engine.evaluate_task(&task_id).await?;
        if evaluation.changed {
            info!(
                task_id = %task_id,
                priority = evaluation.new_priority,
                rules = evaluation.applied_rules.len(),
                "Rules adjusted new task priority"
            );
        }

        self.state.store.snapshot(&task_id).await
    }

    pub async fn get(&self, task_id: &TaskId) -> Result<Task, CoreError> {
        self.state.store.snapshot(task_id).await
    }

    pub async fn list(&self, filter: &TaskFilter, pagination: &Pagination) -> Page<Task> {
        let config = &self.state.config;
        let tasks = self.state.store.list(filter).await;
        pagination.paginate(tasks, config.default_page_size, config.max_page_size)
    }

    /// Delete a task. Its priority log entries are kept.
    pub async fn delete(&self, task_id: &TaskId) -> Result<Task, CoreError> {
        let task = self.state.store.remove(task_id).await?;
        info!(task_id = %task_id, "Task deleted");
        Ok(task)
    }

    /// Move a task to a new status, then re-run the rules if it is still active.
    pub async fn update_status(
        &self,
        task_id: &TaskId,
        update: StatusUpdate,
    ) -> Result<Task, CoreError> {
        let handle = self.state.store.require(task_id).await?;
        let status = {
            let mut task = handle.lock().await;
            if !task.status.can_transition_to(update.status) {
                return Err(CoreError::InvalidStateTransition {
                    from: task.status.to_string(),
                    to: update.status.to_string(),
                });
            }

            let from = task.status;
            task.status = update.status;
            if let Some(result) = update.result {
                task.result = result;
            }
            if let Some(error) = update.error {
                task.error = error;
            }
            task.updated_at = chrono::Utc::now();
            info!(task_id = %task_id, from = %from, to = %task.status, "Task status changed");
            task.status
        };
        self.state.store.invalidate_stats();

        if status.is_active() {
            self.engine.evaluate_task(task_id).await?;
        }
        self.state.store.snapshot(task_id).await
    }

    /// Put a failed task back to pending, consuming one retry.
    pub async fn retry(&self, task_id: &TaskId) -> Result<Task, CoreError> {
        let handle = self.state.store.require(task_id).await?;
        {
            let mut task = handle.lock().await;
            if task.status != TaskStatus::Failed {
                return Err(CoreError::InvalidStateTransition {
                    from: task.status.to_string(),
                    to: TaskStatus::Pending.to_string(),
                });
            }
            if task.retry_count >= task.max_retries {
                warn!(task_id = %task_id, retries = task.retry_count, "Retry limit reached");
                return Err(CoreError::RetryLimitExceeded {
                    task_id: task_id.to_string(),
                    max_retries: task.max_retries,
                });
            }

            task.retry_count += 1;
            task.status = TaskStatus::Pending;
            task.error.clear();
            task.updated_at = chrono::Utc::now();
            info!(task_id = %task_id, attempt = task.retry_count, "Retrying task");
        }
        self.state.store.invalidate_stats();

        self.engine.evaluate_task(task_id).await?;
        self.state.store.snapshot(task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use taskprio_core::{priority, BoundsMode, PriorityBounds, RuleAction, RuleCondition, RuleSpec};

    fn service() -> (Arc<AppState>, TaskService) {
        let state = AppState::new(Config::default());
        (state.clone(), TaskService::new(state))
    }

    fn status(status: TaskStatus) -> StatusUpdate {
        StatusUpdate {
            status,
            result: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_create_uses_defaults() {
        let (_state, service) = service();
        let task = service
            .create(NewTask::new(TaskType::Translation, "hola"))
            .await
            .unwrap();
        assert_eq!(task.priority, priority::NORMAL);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.max_retries, 3);
    }

    #[tokio::test]
    async fn test_create_runs_rules() {
        let (state, service) = service();
        state
            .registry
            .write()
            .await
            .create_rule(
                RuleSpec::new("urgent tag")
                    .when(RuleCondition::contains("tags", "urgent"))
                    .then(RuleAction::SetPriority { value: priority::URGENT }),
            )
            .unwrap();

        let mut request = NewTask::new(TaskType::ContentGeneration, "x");
        request.tags = vec!["urgent".into()];
        let task = service.create(request).await.unwrap();

        assert_eq!(task.priority, priority::URGENT);
        assert_eq!(state.ledger.list_by_task(&task.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_priority() {
        let state = AppState::new(
            Config::default().with_bounds(PriorityBounds::new(0, 3, BoundsMode::Reject).unwrap()),
        );
        let service = TaskService::new(state.clone());
        let mut request = NewTask::new(TaskType::Translation, "x");
        request.priority = Some(7);

        assert!(matches!(
            service.create(request).await,
            Err(CoreError::InvalidPriority { value: 7, .. })
        ));
        assert!(state.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (_state, service) = service();
        let task = service
            .create(NewTask::new(TaskType::Translation, "x"))
            .await
            .unwrap();

        let err = service
            .update_status(&task.id, status(TaskStatus::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));

        service
            .update_status(&task.id, status(TaskStatus::Processing))
            .await
            .unwrap();
        let err = service
            .update_status(&task.id, status(TaskStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));

        let done = service
            .update_status(
                &task.id,
                StatusUpdate {
                    status: TaskStatus::Completed,
                    result: Some("bonjour".into()),
                    error: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result, "bonjour");
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let (_state, service) = service();
        let mut request = NewTask::new(TaskType::Translation, "x");
        request.max_retries = Some(1);
        let task = service.create(request).await.unwrap();

        // Only failed tasks can be retried.
        assert!(service.retry(&task.id).await.is_err());

        service
            .update_status(&task.id, status(TaskStatus::Failed))
            .await
            .unwrap();
        let retried = service.retry(&task.id).await.unwrap();
        assert_eq!(retried.status, TaskStatus::Pending);
        assert_eq!(retried.retry_count, 1);

        service
            .update_status(&task.id, status(TaskStatus::Failed))
            .await
            .unwrap();
        assert!(matches!(
            service.retry(&task.id).await,
            Err(CoreError::RetryLimitExceeded { max_retries: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_keeps_log() {
        let (state, service) = service();
        let task = service
            .create(NewTask::new(TaskType::Translation, "x"))
            .await
            .unwrap();
        RuleEngine::new(state.clone())
            .update_priority(&task.id, 2)
            .await
            .unwrap();

        service.delete(&task.id).await.unwrap();
        assert!(service.get(&task.id).await.unwrap_err().is_not_found());
        assert_eq!(state.ledger.list_by_task(&task.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let (_state, service) = service();
        for i in 0..5 {
            let mut request = NewTask::new(TaskType::Translation, format!("t{i}"));
            request.work_id = if i % 2 == 0 { "even".into() } else { "odd".into() };
            request.priority = Some(i);
            service.create(request).await.unwrap();
        }

        let filter = TaskFilter {
            work_id: Some("even".into()),
            ..Default::default()
        };
        let page = service.list(&filter, &Pagination::new(1, 2)).await;
        assert_eq!(page.total, 3);
        let priorities: Vec<i32> = page.items.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, vec![4, 2]);
    }
}
