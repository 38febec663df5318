//! Task type and attribute resolution.

use crate::{TaskId, TaskStatus, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named priority levels used by task producers.
pub mod priority {
    pub const LOW: i32 = 0;
    pub const NORMAL: i32 = 1;
    pub const HIGH: i32 = 2;
    pub const URGENT: i32 = 3;
}

/// Default retry budget for new tasks.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A Task is one unit of asynchronous work waiting in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,

    /// Work this task belongs to.
    pub work_id: String,

    /// Batch this task was submitted in.
    pub batch_id: String,

    /// Kind of work.
    #[serde(rename = "type")]
    pub task_type: TaskType,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Current priority. Only changed through the priority ledger.
    pub priority: i32,

    /// Input payload.
    pub content: String,

    /// Output payload, set on completion.
    pub result: String,

    /// Error message, set on failure.
    pub error: String,

    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Number of retries performed so far.
    #[serde(default)]
    pub retry_count: u32,

    /// Maximum number of retries allowed.
    #[serde(default)]
    pub max_retries: u32,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// When the task was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Attribute names accepted by [`Task::field`].
    pub const FIELDS: [&'static str; 14] = [
        "id",
        "work_id",
        "batch_id",
        "type",
        "status",
        "priority",
        "content",
        "result",
        "error",
        "tags",
        "retry_count",
        "max_retries",
        "created_at",
        "updated_at",
    ];

    /// Create a new pending Task with normal priority.
    pub fn new(task_type: TaskType, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            work_id: String::new(),
            batch_id: String::new(),
            task_type,
            status: TaskStatus::Pending,
            priority: priority::NORMAL,
            content: content.into(),
            result: String::new(),
            error: String::new(),
            tags: Vec::new(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Builder method to set the work id.
    pub fn with_work(mut self, work_id: impl Into<String>) -> Self {
        self.work_id = work_id.into();
        self
    }

    /// Builder method to set the batch id.
    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = batch_id.into();
        self
    }

    /// Builder method to set the initial priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builder method to set the initial status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder method to add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the attribute `name` resolves to a number, so condition
    /// operands on it must be numbers too.
    pub fn is_numeric_field(name: &str) -> bool {
        matches!(
            name,
            "priority" | "retry_count" | "max_retries" | "created_at" | "updated_at"
        )
    }

    /// Resolve an attribute by its wire name.
    ///
    /// Returns `None` for unknown names; conditions on those fail closed.
    pub fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let value = match name {
            "id" => FieldValue::Text(self.id.as_str()),
            "work_id" => FieldValue::Text(&self.work_id),
            "batch_id" => FieldValue::Text(&self.batch_id),
            "type" => FieldValue::Text(self.task_type.as_str()),
            "status" => FieldValue::Text(self.status.as_str()),
            "priority" => FieldValue::Number(i64::from(self.priority)),
            "content" => FieldValue::Text(&self.content),
            "result" => FieldValue::Text(&self.result),
            "error" => FieldValue::Text(&self.error),
            "tags" => FieldValue::List(&self.tags),
            "retry_count" => FieldValue::Number(i64::from(self.retry_count)),
            "max_retries" => FieldValue::Number(i64::from(self.max_retries)),
            "created_at" => FieldValue::Number(self.created_at.timestamp()),
            "updated_at" => FieldValue::Number(self.updated_at.timestamp()),
            _ => return None,
        };
        Some(value)
    }
}

/// A resolved task attribute, borrowed from the task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(i64),
    List(&'a [String]),
}

impl FieldValue<'_> {
    /// Numeric view of the value, if it has one.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}
