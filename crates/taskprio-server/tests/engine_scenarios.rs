//! End-to-end priority scenarios through the public library API.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use taskprio_core::{
    priority, CoreError, GroupSpec, RuleAction, RuleCondition, RuleSpec, TaskId, TaskStatus,
    TaskType,
};
use taskprio_server::{AppState, Config, NewTask, RuleEngine, StatusUpdate, TaskService};

struct Harness {
    state: Arc<AppState>,
    engine: RuleEngine,
    tasks: TaskService,
}

impl Harness {
    fn new() -> Self {
        let state = AppState::new(Config::default());
        Self {
            engine: RuleEngine::new(state.clone()),
            tasks: TaskService::new(state.clone()),
            state,
        }
    }

    async fn task(&self, task_type: TaskType, priority: i32) -> TaskId {
        let mut request = NewTask::new(task_type, "content");
        request.priority = Some(priority);
        self.tasks.create(request).await.unwrap().id
    }

    async fn priority(&self, id: &TaskId) -> i32 {
        self.tasks.get(id).await.unwrap().priority
    }
}

#[tokio::test]
async fn translation_rule_raises_priority_from_five_to_eight() {
    let h = Harness::new();
    let task_id = h.task(TaskType::Translation, 5).await;

    let rule = h
        .state
        .registry
        .write()
        .await
        .create_rule(
            RuleSpec::new("translations first")
                .when(RuleCondition::eq("type", "translation"))
                .then(RuleAction::IncrementPriority { value: 3 }),
        )
        .unwrap()
        .item;

    let evaluation = h.engine.evaluate_task(&task_id).await.unwrap();
    assert_eq!(evaluation.new_priority, 8);
    assert_eq!(h.priority(&task_id).await, 8);

    let entries = h.state.ledger.list_by_task(&task_id).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(
        (entries[0].old_priority, entries[0].new_priority),
        (5, 8)
    );
    assert_eq!(entries[0].reason, rule.id.as_str());
}

#[tokio::test]
async fn condition_update_touches_only_pending_tasks() {
    let h = Harness::new();
    let a = h.task(TaskType::Translation, 1).await;
    let b = h.task(TaskType::Translation, 1).await;
    h.tasks
        .update_status(
            &b,
            StatusUpdate {
                status: TaskStatus::Processing,
                result: None,
                error: None,
            },
        )
        .await
        .unwrap();

    let outcome = h
        .engine
        .evaluate_by_condition(
            &RuleCondition::eq("status", "pending"),
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(h.priority(&a).await, 10);
    assert_eq!(h.priority(&b).await, 1);

    let entries = h.state.ledger.list_by_task(&a).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason, "condition");
    assert!(h.state.ledger.list_by_task(&b).await.is_empty());
}

#[tokio::test]
async fn empty_condition_list_matches_every_task() {
    let h = Harness::new();
    let ids = vec![
        h.task(TaskType::Translation, 7).await,
        h.task(TaskType::ContentGeneration, priority::URGENT).await,
    ];

    let created = h
        .state
        .registry
        .write()
        .await
        .create_rule(RuleSpec::new("reset").then(RuleAction::SetPriority { value: 0 }))
        .unwrap();
    assert!(created.item.is_catch_all());
    assert!(!created.warnings.is_empty());

    for id in &ids {
        h.engine.evaluate_task(id).await.unwrap();
        assert_eq!(h.priority(id).await, 0);
    }
}

#[tokio::test]
async fn batch_commits_existing_task_despite_missing_one() {
    let h = Harness::new();
    let x = h.task(TaskType::Translation, priority::LOW).await;
    let y = TaskId::new("does-not-exist");

    let outcome = h
        .engine
        .evaluate_batch(&[x.clone(), y.clone()], 2, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.succeeded[0].task_id, x);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].task_id, y);
    assert_eq!(
        outcome.failed[0].error,
        CoreError::TaskNotFound(y.to_string()).to_string()
    );

    assert_eq!(h.priority(&x).await, 2);
    let entries = h.state.ledger.list_by_task(&x).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason, "batch");
}

#[tokio::test]
async fn disabled_group_contributes_no_rules() {
    let h = Harness::new();
    let task_id = h.task(TaskType::Translation, 5).await;

    {
        let mut registry = h.state.registry.write().await;
        let rule = registry
            .create_rule(
                RuleSpec::new("bump")
                    .when(RuleCondition::eq("type", "translation"))
                    .then(RuleAction::IncrementPriority { value: 3 }),
            )
            .unwrap()
            .item;
        registry
            .create_group(GroupSpec::new("paused").with_rule(rule.id).disabled())
            .unwrap();
    }

    let evaluation = h.engine.evaluate_task(&task_id).await.unwrap();
    assert!(evaluation.applied_rules.is_empty());
    assert_eq!(h.priority(&task_id).await, 5);
    assert!(h.state.ledger.list_by_task(&task_id).await.is_empty());
}

#[tokio::test]
async fn every_priority_change_is_logged_with_prior_value() {
    let h = Harness::new();
    let task_id = h.task(TaskType::Translation, 1).await;
    h.state
        .registry
        .write()
        .await
        .create_rule(
            RuleSpec::new("bump")
                .when(RuleCondition::eq("type", "translation"))
                .then(RuleAction::IncrementPriority { value: 1 }),
        )
        .unwrap();

    let cancel = CancellationToken::new();
    h.engine.evaluate_task(&task_id).await.unwrap();
    h.engine
        .evaluate_batch(&[task_id.clone()], 40, &cancel)
        .await
        .unwrap();
    h.engine
        .evaluate_by_condition(&RuleCondition::gte("priority", 40), 7, &cancel)
        .await
        .unwrap();
    h.engine.update_priority(&task_id, 9).await.unwrap();

    let entries = h.state.ledger.list_by_task(&task_id).await;
    let reasons: Vec<&str> = entries.iter().map(|e| e.reason.as_str()).collect();
    assert_eq!(reasons.len(), 4);
    assert_eq!(&reasons[1..], &["batch", "condition", "manual"]);

    let mut expected_old = 1;
    for entry in &entries {
        assert_eq!(entry.old_priority, expected_old);
        expected_old = entry.new_priority;
    }
    assert_eq!(h.priority(&task_id).await, expected_old);
}

#[tokio::test]
async fn stats_total_is_sum_of_statuses() {
    let h = Harness::new();
    for _ in 0..3 {
        h.task(TaskType::Translation, 1).await;
    }
    let failed = h.task(TaskType::ContentGeneration, 1).await;
    h.tasks
        .update_status(
            &failed,
            StatusUpdate {
                status: TaskStatus::Failed,
                result: None,
                error: Some("model timeout".into()),
            },
        )
        .await
        .unwrap();

    let stats = h.state.store.stats().await;
    assert_eq!(stats.total, 4);
    assert_eq!(
        stats.total,
        stats.pending + stats.processing + stats.completed + stats.failed
    );
    assert_eq!(stats.failed, 1);
}
