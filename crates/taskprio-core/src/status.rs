//! Status and type enums for Tasks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a Task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created, waiting for a worker.
    #[default]
    Pending,
    /// Task picked up by a worker.
    Processing,
    /// Task finished with a result.
    Completed,
    /// Task finished with an error.
    Failed,
}

impl TaskStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the task's priority still matters (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether a task may move from `self` to `next` through a status update.
    ///
    /// `Failed -> Pending` is only reachable through retry.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Kind of work a Task carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ContentGeneration,
    Translation,
}

impl TaskType {
    pub const ALL: [TaskType; 2] = [TaskType::ContentGeneration, TaskType::Translation];

    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentGeneration => "content_generation",
            Self::Translation => "translation",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Pending.is_active());
        assert!(TaskStatus::Processing.is_active());
    }

    #[test]
    fn test_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Processing.can_transition_to(TaskStatus::Pending));
    }
}
