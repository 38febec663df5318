//! Priority change log entries.

use crate::{LogId, RuleId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One recorded priority change. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityLogEntry {
    pub id: LogId,
    pub task_id: TaskId,
    pub old_priority: i32,
    pub new_priority: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl PriorityLogEntry {
    pub fn new(task_id: TaskId, old_priority: i32, new_priority: i32, reason: &ChangeReason) -> Self {
        Self {
            id: LogId::generate(),
            task_id,
            old_priority,
            new_priority,
            reason: reason.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Why a priority changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
    /// Rules that matched, in application order.
    Rules(Vec<RuleId>),
    /// Batch update over an explicit id list.
    Batch,
    /// Update over every task matching an ad hoc condition.
    Condition,
    /// Direct update of a single task.
    Manual,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rules(ids) => {
                let ids: Vec<&str> = ids.iter().map(RuleId::as_str).collect();
                f.write_str(&ids.join(","))
            }
            Self::Batch => f.write_str("batch"),
            Self::Condition => f.write_str("condition"),
            Self::Manual => f.write_str("manual"),
        }
    }
}
