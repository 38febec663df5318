//! TaskPrio CLI - Command line interface for the TaskPrio server.

mod client;
mod error;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use taskprio_core::{
    Page, PriorityLogEntry, PriorityRule, RuleCondition, RuleGroup, RuleSpec, Scalar, Task,
    TaskStats, TaskStatus,
};

use client::{BatchResult, HttpClient};

/// TaskPrio CLI - Priority rule management tool
#[derive(Parser)]
#[command(name = "taskprio")]
#[command(about = "CLI for the TaskPrio server", long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Show task counts
    Stats {
        /// Only count tasks of this work
        #[arg(long)]
        work_id: Option<String>,
    },

    /// List tasks, highest priority first
    #[command(name = "list-tasks")]
    ListTasks {
        #[arg(long)]
        status: Option<String>,

        #[arg(long = "type")]
        task_type: Option<String>,

        #[arg(long)]
        work_id: Option<String>,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "20")]
        size: usize,
    },

    /// Create a new task
    #[command(name = "create-task")]
    CreateTask {
        /// Task type (content_generation or translation)
        #[arg(short = 't', long = "type")]
        task_type: String,

        /// Task content
        #[arg(short, long, default_value = "")]
        content: String,

        /// Initial priority
        #[arg(short, long, allow_negative_numbers = true)]
        priority: Option<i32>,

        #[arg(long, default_value = "")]
        work_id: String,

        #[arg(long, default_value = "")]
        batch_id: String,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Get task details
    #[command(name = "get-task")]
    GetTask {
        /// Task ID
        id: String,
    },

    /// Set one task's priority
    #[command(name = "set-priority")]
    SetPriority {
        /// Task ID
        id: String,

        #[arg(allow_negative_numbers = true)]
        priority: i32,
    },

    /// Set one priority on several tasks
    #[command(name = "batch-priority")]
    BatchPriority {
        #[arg(short, long, allow_negative_numbers = true)]
        priority: i32,

        /// Task IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Set one priority on every task matching a condition
    #[command(name = "priority-where")]
    PriorityWhere {
        /// Task field, e.g. status, type, priority, tags
        #[arg(long)]
        field: String,

        /// eq, ne, gt, gte, lt, lte, contains or in
        #[arg(long = "op")]
        operator: String,

        /// Operand; comma-separated for `in`
        #[arg(long)]
        value: String,

        #[arg(short, long, allow_negative_numbers = true)]
        priority: i32,
    },

    /// Run the rules over one task now
    Evaluate {
        /// Task ID
        id: String,
    },

    /// Show a task's priority history
    Logs {
        /// Task ID
        id: String,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "20")]
        size: usize,
    },

    /// List priority rules
    #[command(name = "list-rules")]
    ListRules {
        #[arg(long)]
        enabled: Option<bool>,

        /// Name substring
        #[arg(long)]
        name: Option<String>,
    },

    /// Create a rule from a JSON file
    #[command(name = "create-rule")]
    CreateRule {
        /// Path to a JSON rule definition
        #[arg(short, long)]
        file: std::path::PathBuf,
    },

    /// List rule groups
    #[command(name = "list-groups")]
    ListGroups,

    /// Add a rule to a group
    #[command(name = "add-to-group")]
    AddToGroup { group_id: String, rule_id: String },

    /// Remove a rule from a group
    #[command(name = "remove-from-group")]
    RemoveFromGroup { group_id: String, rule_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = HttpClient::new(&cli.addr)?;

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            println!("{}", if healthy { "ok" } else { "unhealthy" });
        }
        Commands::Stats { work_id } => {
            let query: Vec<(&str, String)> =
                work_id.into_iter().map(|w| ("work_id", w)).collect();
            let stats: TaskStats = client.get_json("/api/v1/stats", &query).await?;
            print_stats(&stats);
        }
        Commands::ListTasks {
            status,
            task_type,
            work_id,
            page,
            size,
        } => {
            let mut query = vec![("page", page.to_string()), ("size", size.to_string())];
            query.extend(status.map(|s| ("status", s)));
            query.extend(task_type.map(|t| ("type", t)));
            query.extend(work_id.map(|w| ("work_id", w)));
            let tasks: Page<Task> = client.get_json("/api/v1/tasks", &query).await?;
            print_tasks(&tasks);
        }
        Commands::CreateTask {
            task_type,
            content,
            priority,
            work_id,
            batch_id,
            tags,
        } => {
            let body = json!({
                "type": task_type,
                "content": content,
                "priority": priority,
                "work_id": work_id,
                "batch_id": batch_id,
                "tags": tags,
            });
            let task: Task = client.post_json("/api/v1/tasks", &body).await?;
            println!("Task created:");
            print_task(&task);
        }
        Commands::GetTask { id } => {
            let task: Task = client.get_json(&format!("/api/v1/tasks/{id}"), &[]).await?;
            print_task(&task);
        }
        Commands::SetPriority { id, priority } => {
            let update: serde_json::Value = client
                .put_json(
                    &format!("/api/v1/tasks/{id}/priority"),
                    &json!({ "priority": priority }),
                )
                .await?;
            println!(
                "Task {id}: {} -> {}",
                update["old_priority"], update["new_priority"]
            );
        }
        Commands::BatchPriority { priority, ids } => {
            let result: BatchResult = client
                .put_json(
                    "/api/v1/priority/batch",
                    &json!({ "ids": ids, "priority": priority }),
                )
                .await?;
            print_batch(&result);
        }
        Commands::PriorityWhere {
            field,
            operator,
            value,
            priority,
        } => {
            let condition = parse_condition(&field, &operator, &value)?;
            let result: BatchResult = client
                .put_json(
                    "/api/v1/priority/condition",
                    &json!({ "condition": condition, "priority": priority }),
                )
                .await?;
            print_batch(&result);
        }
        Commands::Evaluate { id } => {
            let evaluation: serde_json::Value = client
                .post_json(&format!("/api/v1/tasks/{id}/evaluate"), &json!({}))
                .await?;
            println!(
                "Task {id}: {} -> {} (rules: {})",
                evaluation["old_priority"], evaluation["new_priority"], evaluation["applied_rules"]
            );
        }
        Commands::Logs { id, page, size } => {
            let query = [("page", page.to_string()), ("size", size.to_string())];
            let logs: Page<PriorityLogEntry> = client
                .get_json(&format!("/api/v1/tasks/{id}/priority-logs"), &query)
                .await?;
            print_logs(&logs);
        }
        Commands::ListRules { enabled, name } => {
            let mut query = Vec::new();
            query.extend(enabled.map(|e| ("enabled", e.to_string())));
            query.extend(name.map(|n| ("name", n)));
            let rules: Page<PriorityRule> = client.get_json("/api/v1/rules", &query).await?;
            print_rules(&rules);
        }
        Commands::CreateRule { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let spec: RuleSpec = serde_json::from_str(&raw)
                .map_err(|e| error::ClientError::Serialization(e.to_string()))?;
            let created: serde_json::Value = client.post_json("/api/v1/rules", &spec).await?;
            println!("Rule created: {}", created["id"].as_str().unwrap_or("?"));
            if let Some(warnings) = created["warnings"].as_array() {
                for warning in warnings {
                    println!("  warning: {warning}");
                }
            }
        }
        Commands::ListGroups => {
            let groups: Page<RuleGroup> = client.get_json("/api/v1/groups", &[]).await?;
            print_groups(&groups);
        }
        Commands::AddToGroup { group_id, rule_id } => {
            let result: serde_json::Value = client
                .post_json(
                    &format!("/api/v1/groups/{group_id}/rules"),
                    &json!({ "rule_id": rule_id }),
                )
                .await?;
            print_membership("added to", &result);
        }
        Commands::RemoveFromGroup { group_id, rule_id } => {
            let result: serde_json::Value = client
                .delete_json(&format!("/api/v1/groups/{group_id}/rules/{rule_id}"))
                .await?;
            print_membership("removed from", &result);
        }
    }

    Ok(())
}

/// Build a condition from command-line strings.
fn parse_condition(field: &str, operator: &str, value: &str) -> Result<RuleCondition, String> {
    let number = || {
        value
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("operator '{operator}' needs a number, got '{value}'"))
    };
    let numeric = Task::is_numeric_field(field);
    let scalar = |raw: &str| -> Result<Scalar, String> {
        let raw = raw.trim();
        if !numeric {
            return Ok(Scalar::Text(raw.to_string()));
        }
        raw.parse::<i64>()
            .map(Scalar::Number)
            .map_err(|_| format!("field '{field}' needs a number, got '{raw}'"))
    };

    let condition = match operator {
        "eq" => RuleCondition::eq(field, scalar(value)?),
        "ne" => RuleCondition::ne(field, scalar(value)?),
        "gt" => RuleCondition::gt(field, number()?),
        "gte" => RuleCondition::gte(field, number()?),
        "lt" => RuleCondition::lt(field, number()?),
        "lte" => RuleCondition::lte(field, number()?),
        "contains" => RuleCondition::contains(field, value),
        "in" => RuleCondition::In {
            field: field.to_string(),
            value: value.split(',').map(scalar).collect::<Result<_, _>>()?,
        },
        other => return Err(format!("unknown operator '{other}'")),
    };
    Ok(condition)
}

fn print_stats(stats: &TaskStats) {
    println!("Tasks: {}", stats.total);
    for status in TaskStatus::ALL {
        println!("  {:<12} {}", status.as_str(), stats.count(status));
    }
    println!("By type:");
    for (task_type, count) in &stats.by_type {
        println!("  {:<20} {}", task_type.as_str(), count);
    }
    if !stats.by_priority.is_empty() {
        println!("By priority:");
        for (priority, count) in &stats.by_priority {
            println!("  {priority:<4} {count}");
        }
    }
}

fn print_tasks(page: &Page<Task>) {
    println!("Tasks ({} of {}):", page.items.len(), page.total);
    println!(
        "{:<36}  {:<10}  {:<18}  {:>8}  {}",
        "ID", "STATUS", "TYPE", "PRIORITY", "CREATED"
    );
    println!("{}", "-".repeat(96));

    for task in &page.items {
        println!(
            "{:<36}  {:<10}  {:<18}  {:>8}  {}",
            task.id,
            task.status,
            task.task_type,
            task.priority,
            format_timestamp(&task.created_at)
        );
    }
}

fn print_task(task: &Task) {
    println!("  ID:         {}", task.id);
    println!("  Type:       {}", task.task_type);
    println!("  Status:     {}", task.status);
    println!("  Priority:   {}", task.priority);
    if !task.work_id.is_empty() {
        println!("  Work:       {}", task.work_id);
    }
    if !task.batch_id.is_empty() {
        println!("  Batch:      {}", task.batch_id);
    }
    if !task.tags.is_empty() {
        println!("  Tags:       {}", task.tags.join(", "));
    }
    println!("  Retries:    {}/{}", task.retry_count, task.max_retries);
    println!("  Created:    {}", format_timestamp(&task.created_at));
    if !task.error.is_empty() {
        println!("  Error:      {}", task.error);
    }
}

fn print_batch(result: &BatchResult) {
    println!("{}", result.summary);
    for update in &result.succeeded {
        println!(
            "  ok    {}  {} -> {}",
            update.task_id, update.old_priority, update.new_priority
        );
    }
    for failure in &result.failed {
        println!("  fail  {}  {}", failure.task_id, failure.error);
    }
}

fn print_logs(page: &Page<PriorityLogEntry>) {
    println!("Priority changes ({} of {}):", page.items.len(), page.total);
    println!("{:<20}  {:>5}  {:>5}  {}", "WHEN", "OLD", "NEW", "REASON");
    println!("{}", "-".repeat(80));
    for entry in &page.items {
        println!(
            "{:<20}  {:>5}  {:>5}  {}",
            format_timestamp(&entry.created_at),
            entry.old_priority,
            entry.new_priority,
            entry.reason
        );
    }
}

fn print_rules(page: &Page<PriorityRule>) {
    println!("Rules ({} of {}):", page.items.len(), page.total);
    println!("{:<36}  {:<8}  {:<24}  {}", "ID", "ENABLED", "NAME", "WHEN");
    println!("{}", "-".repeat(96));
    for rule in &page.items {
        let conditions: Vec<String> = rule.conditions.iter().map(|c| c.to_string()).collect();
        let when = if conditions.is_empty() {
            "(always)".to_string()
        } else {
            conditions.join(" and ")
        };
        println!(
            "{:<36}  {:<8}  {:<24}  {}",
            rule.id, rule.enabled, rule.name, when
        );
    }
}

fn print_groups(page: &Page<RuleGroup>) {
    println!("Groups ({} of {}):", page.items.len(), page.total);
    println!("{:<36}  {:<8}  {:<24}  {}", "ID", "ENABLED", "NAME", "RULES");
    println!("{}", "-".repeat(80));
    for group in &page.items {
        println!(
            "{:<36}  {:<8}  {:<24}  {}",
            group.id,
            group.enabled,
            group.name,
            group.rule_ids.len()
        );
    }
}

fn print_membership(verb: &str, result: &serde_json::Value) {
    let changed = result["changed"].as_bool().unwrap_or(false);
    println!(
        "Rule {} {verb} group {}{}",
        result["rule_id"].as_str().unwrap_or("?"),
        result["group_id"].as_str().unwrap_or("?"),
        if changed { "" } else { " (no change)" }
    );
}

fn format_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_condition() {
        assert_eq!(
            parse_condition("priority", "gte", "5").unwrap(),
            RuleCondition::gte("priority", 5)
        );
        assert!(parse_condition("priority", "gt", "high").is_err());
    }

    #[test]
    fn test_parse_scalar_condition() {
        assert_eq!(
            parse_condition("status", "eq", "pending").unwrap(),
            RuleCondition::eq("status", "pending")
        );
        assert_eq!(
            parse_condition("retry_count", "ne", "0").unwrap(),
            RuleCondition::ne("retry_count", 0i64)
        );
    }

    #[test]
    fn test_parse_scalar_kind_follows_field() {
        assert_eq!(
            parse_condition("work_id", "eq", "42").unwrap(),
            RuleCondition::eq("work_id", "42")
        );
        assert_eq!(
            parse_condition("priority", "in", "1, 2").unwrap(),
            RuleCondition::In {
                field: "priority".to_string(),
                value: vec![Scalar::Number(1), Scalar::Number(2)],
            }
        );
        assert!(parse_condition("priority", "eq", "high").is_err());
    }

    #[test]
    fn test_parse_in_condition() {
        assert_eq!(
            parse_condition("type", "in", "translation, content_generation").unwrap(),
            RuleCondition::is_in("type", ["translation", "content_generation"])
        );
    }

    #[test]
    fn test_parse_unknown_operator() {
        assert!(parse_condition("status", "like", "p%").is_err());
    }

    #[test]
    fn test_cli_parses_batch_command() {
        let cli = Cli::try_parse_from(["taskprio", "batch-priority", "-p", "2", "a", "b"]).unwrap();
        match cli.command {
            Commands::BatchPriority { priority, ids } => {
                assert_eq!(priority, 2);
                assert_eq!(ids, vec!["a", "b"]);
            }
            _ => panic!("expected batch-priority"),
        }
    }
}
