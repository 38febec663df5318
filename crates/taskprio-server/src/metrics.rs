//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use taskprio_core::{TaskStatus, TaskType};

use crate::state::AppState;

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_task_metrics(state, &mut output).await;
    collect_rule_metrics(state, &mut output).await;
    collect_log_metrics(state, &mut output).await;

    output
}

fn write_header(output: &mut String, name: &str, help: &str, kind: &str) {
    writeln!(output, "# HELP {name} {help}").ok();
    writeln!(output, "# TYPE {name} {kind}").ok();
}

/// Task counts by status and by type.
async fn collect_task_metrics(state: &Arc<AppState>, output: &mut String) {
    let stats = state.store.stats().await;

    write_header(
        output,
        "taskprio_tasks_total",
        "Number of tasks by status",
        "gauge",
    );
    for status in TaskStatus::ALL {
        writeln!(
            output,
            "taskprio_tasks_total{{status=\"{status}\"}} {}",
            stats.count(status)
        )
        .ok();
    }

    writeln!(output).ok();
    write_header(
        output,
        "taskprio_tasks_by_type",
        "Number of tasks by type",
        "gauge",
    );
    for task_type in TaskType::ALL {
        let count = stats.by_type.get(&task_type).copied().unwrap_or(0);
        writeln!(
            output,
            "taskprio_tasks_by_type{{type=\"{task_type}\"}} {count}"
        )
        .ok();
    }
}

/// Rule and group counts by enabled flag.
async fn collect_rule_metrics(state: &Arc<AppState>, output: &mut String) {
    let registry = state.registry.read().await;

    let rules_enabled = registry.rules().filter(|r| r.enabled).count();
    let rules_disabled = registry.rule_count() - rules_enabled;
    let groups_enabled = registry.groups().filter(|g| g.enabled).count();
    let groups_disabled = registry.group_count() - groups_enabled;
    let active = registry.active_rules().len();
    drop(registry);

    writeln!(output).ok();
    write_header(
        output,
        "taskprio_rules",
        "Number of priority rules by enabled flag",
        "gauge",
    );
    writeln!(output, "taskprio_rules{{enabled=\"true\"}} {rules_enabled}").ok();
    writeln!(output, "taskprio_rules{{enabled=\"false\"}} {rules_disabled}").ok();

    writeln!(output).ok();
    write_header(
        output,
        "taskprio_rules_active",
        "Number of rules taking part in evaluation",
        "gauge",
    );
    writeln!(output, "taskprio_rules_active {active}").ok();

    writeln!(output).ok();
    write_header(
        output,
        "taskprio_rule_groups",
        "Number of rule groups by enabled flag",
        "gauge",
    );
    writeln!(
        output,
        "taskprio_rule_groups{{enabled=\"true\"}} {groups_enabled}"
    )
    .ok();
    writeln!(
        output,
        "taskprio_rule_groups{{enabled=\"false\"}} {groups_disabled}"
    )
    .ok();
}

async fn collect_log_metrics(state: &Arc<AppState>, output: &mut String) {
    let entries = state.ledger.len().await;

    writeln!(output).ok();
    write_header(
        output,
        "taskprio_priority_changes_total",
        "Priority log entries recorded",
        "counter",
    );
    writeln!(output, "taskprio_priority_changes_total {entries}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use taskprio_core::{GroupSpec, RuleAction, RuleSpec, Task};

    #[tokio::test]
    async fn test_collect_metrics_empty_state() {
        let state = AppState::new(Config::default());
        let output = collect_metrics(&state).await;

        assert!(output.contains("taskprio_tasks_total{status=\"pending\"} 0"));
        assert!(output.contains("taskprio_tasks_by_type{type=\"translation\"} 0"));
        assert!(output.contains("taskprio_rules{enabled=\"true\"} 0"));
        assert!(output.contains("taskprio_rule_groups{enabled=\"false\"} 0"));
        assert!(output.contains("taskprio_priority_changes_total 0"));
    }

    #[tokio::test]
    async fn test_collect_metrics_counts() {
        let state = AppState::new(Config::default());
        state
            .store
            .insert(Task::new(TaskType::Translation, "x").with_status(TaskStatus::Failed))
            .await
            .unwrap();
        {
            let mut registry = state.registry.write().await;
            let rule = registry
                .create_rule(RuleSpec::new("r").then(RuleAction::SetPriority { value: 1 }))
                .unwrap()
                .item;
            registry
                .create_rule(
                    RuleSpec::new("off")
                        .then(RuleAction::SetPriority { value: 1 })
                        .disabled(),
                )
                .unwrap();
            registry
                .create_group(GroupSpec::new("g").with_rule(rule.id).disabled())
                .unwrap();
        }

        let output = collect_metrics(&state).await;
        assert!(output.contains("taskprio_tasks_total{status=\"failed\"} 1"));
        assert!(output.contains("taskprio_tasks_by_type{type=\"translation\"} 1"));
        assert!(output.contains("taskprio_rules{enabled=\"true\"} 1"));
        assert!(output.contains("taskprio_rules{enabled=\"false\"} 1"));
        assert!(output.contains("taskprio_rules_active 0"));
        assert!(output.contains("taskprio_rule_groups{enabled=\"false\"} 1"));
    }
}
