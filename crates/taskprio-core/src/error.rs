//! Core domain errors.

use thiserror::Error;

/// Core domain errors for TaskPrio.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Task not found.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Priority rule not found.
    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    /// Rule group not found.
    #[error("Rule group not found: {0}")]
    GroupNotFound(String),

    /// Rule template not found.
    #[error("Rule template not found: {0}")]
    TemplateNotFound(String),

    /// Rule definition rejected at authoring time.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Explicit priority outside the configured bounds (reject mode only).
    #[error("Priority {value} outside allowed range {min}..={max}")]
    InvalidPriority { value: i32, min: i32, max: i32 },

    /// Optimistic version check failed.
    #[error("{entity} '{id}' was modified concurrently (expected version {expected}, found {actual})")]
    ConcurrentModification {
        entity: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Task has used up its retries.
    #[error("Task {task_id} exceeded max retries ({max_retries})")]
    RetryLimitExceeded { task_id: String, max_retries: u32 },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Returns true for any of the not-found variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TaskNotFound(_)
                | Self::RuleNotFound(_)
                | Self::GroupNotFound(_)
                | Self::TemplateNotFound(_)
        )
    }
}
