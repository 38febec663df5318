//! HTTP request handlers.

mod groups;
mod health;
mod priority;
mod rules;
mod tasks;
mod templates;

pub use groups::{
    add_rule_to_group, create_group, delete_group, get_group, group_rules, list_groups,
    remove_rule_from_group, update_group,
};
pub use health::{get_stats, health_check, metrics_handler};
pub use priority::{batch_priority, condition_priority};
pub use rules::{create_rule, delete_rule, get_rule, list_rules, update_rule};
pub use tasks::{
    create_task, delete_task, evaluate_task, get_task, list_tasks, priority_logs, retry_task,
    set_priority, update_status,
};
pub use templates::{
    create_template, delete_template, get_template, instantiate_template, list_templates,
    replace_template,
};
