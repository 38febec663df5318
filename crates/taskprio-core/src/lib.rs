//! TaskPrio Core Domain Types
//!
//! Pure domain types and the pure half of the priority rule engine:
//! - Tasks and their attributes
//! - Rule conditions (evaluated against tasks) and actions (applied to priorities)
//! - Rules, templates and groups
//! - Priority log entries and task statistics
//!
//! Nothing here touches the network, a database, or an async runtime.

pub mod action;
pub mod condition;
pub mod error;
pub mod ids;
pub mod log;
pub mod query;
pub mod rule;
pub mod stats;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use action::{apply_all, BoundsMode, PriorityBounds, RuleAction};
pub use condition::{matches_all, RuleCondition, Scalar};
pub use error::CoreError;
pub use ids::{GroupId, LogId, RuleId, TaskId, TemplateId};
pub use log::{ChangeReason, PriorityLogEntry};
pub use query::{GroupFilter, Page, Pagination, RuleFilter, TaskFilter, TemplateFilter};
pub use rule::{
    validate_definition, GroupPatch, GroupSpec, Instantiation, PriorityRule, RuleGroup,
    RulePatch, RuleSpec, RuleTemplate, RuleWarning, TemplateSpec,
};
pub use stats::TaskStats;
pub use status::{TaskStatus, TaskType};
pub use task::{priority, FieldValue, Task};
