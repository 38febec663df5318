//! Rule engine: decides task priorities and commits the changes.
//!
//! Every priority write goes through [`PriorityLedger::commit`] while the
//! task's lock is held, so each log entry's `old_priority` is the value it
//! actually replaced.
//!
//! [`PriorityLedger::commit`]: crate::ledger::PriorityLedger::commit

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskprio_core::{
    ChangeReason, CoreError, GroupId, PriorityBounds, PriorityLogEntry, PriorityRule,
    RuleCondition, RuleId, Task, TaskId,
};

use crate::registry::RuleRegistry;
use crate::state::AppState;
use crate::store::TaskHandle;

/// Run every rule over a task snapshot.
///
/// Conditions always see `task` as it was before evaluation; only the
/// priority value is threaded from one matching rule to the next.
pub fn fold_rules(
    rules: &[&PriorityRule],
    task: &Task,
    bounds: &PriorityBounds,
) -> (i32, Vec<RuleId>) {
    let mut priority = task.priority;
    let mut applied = Vec::new();
    for rule in rules {
        if rule.matches(task) {
            priority = taskprio_core::apply_all(priority, &rule.actions, bounds);
            applied.push(rule.id.clone());
        }
    }
    (priority, applied)
}

/// Outcome of evaluating one task against the active rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub task_id: TaskId,
    pub old_priority: i32,
    pub new_priority: i32,
    /// Rules whose conditions matched, in application order.
    pub applied_rules: Vec<RuleId>,
    pub changed: bool,
}

/// A task whose priority was assigned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskUpdate {
    pub task_id: TaskId,
    pub old_priority: i32,
    pub new_priority: i32,
}

/// A task that could not be updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub error: String,
}

/// Result of a batch or conditional update.
///
/// Work committed before a failure or cancellation stays committed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<TaskUpdate>,
    pub failed: Vec<TaskFailure>,
    /// Tasks not visited because the operation was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
}

impl BatchOutcome {
    /// Entries actually written to the priority log.
    pub fn changed(&self) -> usize {
        self.succeeded
            .iter()
            .filter(|u| u.old_priority != u.new_priority)
            .count()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.failed.len()
        );
        if self.cancelled {
            summary.push_str(&format!(", cancelled with {} not visited", self.skipped));
        }
        summary
    }
}

/// Result of re-running the rules over active tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReevaluationSummary {
    pub visited: usize,
    pub changed: usize,
    pub cancelled: bool,
}

/// Applies rules, batch updates and conditional updates to stored tasks.
#[derive(Clone)]
pub struct RuleEngine {
    state: Arc<AppState>,
}

impl RuleEngine {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn bounds(&self) -> &PriorityBounds {
        &self.state.config.bounds
    }

    /// Write a new priority through the ledger. Caller holds the task lock.
    async fn commit(
        &self,
        task: &mut Task,
        new_priority: i32,
        reason: &ChangeReason,
    ) -> Option<PriorityLogEntry> {
        let entry = self.state.ledger.commit(task, new_priority, reason).await;
        if entry.is_some() {
            self.state.store.invalidate_stats();
        }
        entry
    }

    /// Evaluate one task against every active rule and commit the result.
    pub async fn evaluate_task(&self, task_id: &TaskId) -> Result<Evaluation, CoreError> {
        let handle = self.state.store.require(task_id).await?;
        self.evaluate_handle(task_id, &handle, false)
            .await?
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))
    }

    /// Returns `None` if the task was deleted before its lock was acquired,
    /// or if `only_active` is set and the task is no longer pending or
    /// processing once locked.
    async fn evaluate_handle(
        &self,
        task_id: &TaskId,
        handle: &TaskHandle,
        only_active: bool,
    ) -> Result<Option<Evaluation>, CoreError> {
        let registry = self.state.registry.read().await;
        let mut task = handle.lock().await;
        if !self.state.store.contains(task_id).await {
            return Ok(None);
        }
        if only_active && !task.status.is_active() {
            return Ok(None);
        }

        let rules = registry.active_rules();
        let old_priority = task.priority;
        let (new_priority, applied_rules) = fold_rules(&rules, &task, self.bounds());
        drop(registry);

        let changed = self
            .commit(&mut task, new_priority, &ChangeReason::Rules(applied_rules.clone()))
            .await
            .is_some();

        debug!(
            task_id = %task_id,
            old_priority,
            new_priority,
            matched = applied_rules.len(),
            "Evaluated task"
        );

        Ok(Some(Evaluation {
            task_id: task_id.clone(),
            old_priority,
            new_priority,
            applied_rules,
            changed,
        }))
    }

    /// Assign a priority to one task under its lock.
    async fn assign(
        &self,
        task_id: &TaskId,
        handle: &TaskHandle,
        priority: i32,
        reason: &ChangeReason,
    ) -> Result<TaskUpdate, CoreError> {
        let mut task = handle.lock().await;
        if !self.state.store.contains(task_id).await {
            return Err(CoreError::TaskNotFound(task_id.to_string()));
        }
        let old_priority = task.priority;
        self.commit(&mut task, priority, reason).await;
        Ok(TaskUpdate {
            task_id: task_id.clone(),
            old_priority,
            new_priority: task.priority,
        })
    }

    /// Set one task's priority directly.
    pub async fn update_priority(
        &self,
        task_id: &TaskId,
        priority: i32,
    ) -> Result<TaskUpdate, CoreError> {
        let priority = self.bounds().resolve(priority)?;
        let handle = self.state.store.require(task_id).await?;
        self.assign(task_id, &handle, priority, &ChangeReason::Manual)
            .await
    }

    /// Set `priority` on every listed task.
    ///
    /// Best effort: a missing task is reported in `failed` and the rest of
    /// the batch continues. An out-of-range priority under rejecting bounds
    /// fails the whole request before any task is touched.
    pub async fn evaluate_batch(
        &self,
        task_ids: &[TaskId],
        priority: i32,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, CoreError> {
        let priority = self.bounds().resolve(priority)?;
        let mut outcome = BatchOutcome::default();

        for (index, task_id) in task_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                outcome.skipped = task_ids.len() - index;
                break;
            }

            let result = match self.state.store.require(task_id).await {
                Ok(handle) => {
                    self.assign(task_id, &handle, priority, &ChangeReason::Batch)
                        .await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(update) => outcome.succeeded.push(update),
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Batch priority update failed");
                    outcome.failed.push(TaskFailure {
                        task_id: task_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(priority, outcome = %outcome.summary(), "Batch priority update");
        Ok(outcome)
    }

    /// Set `priority` on every task that satisfies `condition`.
    ///
    /// Equivalent to a one-off rule with a single condition and a single
    /// `set_priority` action, logged with reason "condition".
    pub async fn evaluate_by_condition(
        &self,
        condition: &RuleCondition,
        priority: i32,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, CoreError> {
        let priority = self.bounds().resolve(priority)?;
        let handles = self.state.store.handles().await;
        let mut outcome = BatchOutcome::default();

        for (index, (task_id, handle)) in handles.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                outcome.skipped = handles.len() - index;
                break;
            }

            let mut task = handle.lock().await;
            if !self.state.store.contains(task_id).await || !condition.evaluate(&task) {
                continue;
            }
            let old_priority = task.priority;
            self.commit(&mut task, priority, &ChangeReason::Condition)
                .await;
            outcome.succeeded.push(TaskUpdate {
                task_id: task_id.clone(),
                old_priority,
                new_priority: task.priority,
            });
        }

        info!(
            condition = %condition,
            priority,
            outcome = %outcome.summary(),
            "Conditional priority update"
        );
        Ok(outcome)
    }

    /// Re-run the rules over every pending or processing task.
    pub async fn reevaluate_active(&self, cancel: &CancellationToken) -> ReevaluationSummary {
        let mut summary = ReevaluationSummary::default();

        for (task_id, handle) in self.state.store.handles().await {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            // Deleted or finished between listing and evaluation; nothing to do.
            if let Ok(Some(evaluation)) = self.evaluate_handle(&task_id, &handle, true).await {
                summary.visited += 1;
                if evaluation.changed {
                    summary.changed += 1;
                }
            }
        }

        info!(
            visited = summary.visited,
            changed = summary.changed,
            cancelled = summary.cancelled,
            "Re-evaluated active tasks"
        );
        summary
    }

    /// Run a registry mutation under the write lock.
    ///
    /// Returns the mutation's result and whether the set of active rules
    /// (or any active rule's definition) changed, which is when tasks need
    /// re-evaluating.
    pub async fn mutate_registry<T, F>(&self, mutate: F) -> Result<(T, bool), CoreError>
    where
        F: FnOnce(&mut RuleRegistry) -> Result<T, CoreError>,
    {
        let mut registry = self.state.registry.write().await;
        let before = registry.active_fingerprint();
        let value = mutate(&mut *registry)?;
        let changed = registry.active_fingerprint() != before;
        Ok((value, changed))
    }

    /// Run a registry mutation and re-evaluate active tasks if it changed the
    /// active rule set.
    ///
    /// The mutation is committed once this returns `Ok`; the re-evaluation
    /// does not look the changed rule or group up again.
    pub async fn mutate_and_reevaluate<T, F>(
        &self,
        mutate: F,
        cancel: &CancellationToken,
    ) -> Result<(T, Option<ReevaluationSummary>), CoreError>
    where
        F: FnOnce(&mut RuleRegistry) -> Result<T, CoreError>,
    {
        let (value, changed) = self.mutate_registry(mutate).await?;
        let reevaluation = if changed {
            Some(self.reevaluate_active(cancel).await)
        } else {
            None
        };
        Ok((value, reevaluation))
    }

    /// Re-evaluate after a rule was created or updated.
    pub async fn on_rule_changed(
        &self,
        rule_id: &RuleId,
        cancel: &CancellationToken,
    ) -> Result<ReevaluationSummary, CoreError> {
        self.state.registry.read().await.get_rule(rule_id)?;
        debug!(rule_id = %rule_id, "Rule changed");
        Ok(self.reevaluate_active(cancel).await)
    }

    /// Re-evaluate after a group or its membership changed.
    pub async fn on_group_changed(
        &self,
        group_id: &GroupId,
        cancel: &CancellationToken,
    ) -> Result<ReevaluationSummary, CoreError> {
        self.state.registry.read().await.get_group(group_id)?;
        debug!(group_id = %group_id, "Group changed");
        Ok(self.reevaluate_active(cancel).await)
    }
}
