//! List filters and pagination.

use crate::{PriorityRule, RuleGroup, RuleTemplate, Task, TaskStatus, TaskType};
use serde::{Deserialize, Serialize};

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "Pagination::first_page")]
    pub page: usize,
    #[serde(default)]
    pub size: Option<usize>,
}

impl Pagination {
    fn first_page() -> usize {
        1
    }

    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page,
            size: Some(size),
        }
    }

    /// Cut one page out of `items`, reporting the unpaged total.
    ///
    /// A missing or zero size falls back to `default_size`; sizes above
    /// `max_size` are capped. Page 0 is treated as page 1.
    pub fn paginate<T>(&self, items: Vec<T>, default_size: usize, max_size: usize) -> Page<T> {
        let size = match self.size {
            Some(0) | None => default_size,
            Some(size) => size.min(max_size),
        };
        let page = self.page.max(1);
        let total = items.len();
        let items = items
            .into_iter()
            .skip((page - 1).saturating_mul(size))
            .take(size)
            .collect();
        Page { items, total }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            size: None,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Task list filter. Absent fields don't filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub work_id: Option<String>,
    pub batch_id: Option<String>,
    pub min_priority: Option<i32>,
    pub max_priority: Option<i32>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.task_type.map_or(true, |t| task.task_type == t)
            && self.work_id.as_deref().map_or(true, |w| task.work_id == w)
            && self.batch_id.as_deref().map_or(true, |b| task.batch_id == b)
            && self.min_priority.map_or(true, |min| task.priority >= min)
            && self.max_priority.map_or(true, |max| task.priority <= max)
    }
}

fn name_matches(name: &str, needle: Option<&str>) -> bool {
    needle.map_or(true, |needle| {
        name.to_lowercase().contains(&needle.to_lowercase())
    })
}

/// Rule list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFilter {
    pub enabled: Option<bool>,
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
}

impl RuleFilter {
    pub fn matches(&self, rule: &PriorityRule) -> bool {
        self.enabled.map_or(true, |e| rule.enabled == e)
            && name_matches(&rule.name, self.name.as_deref())
    }
}

/// Group list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFilter {
    pub enabled: Option<bool>,
    pub name: Option<String>,
}

impl GroupFilter {
    pub fn matches(&self, group: &RuleGroup) -> bool {
        self.enabled.map_or(true, |e| group.enabled == e)
            && name_matches(&group.name, self.name.as_deref())
    }
}

/// Template list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFilter {
    pub name: Option<String>,
}

impl TemplateFilter {
    pub fn matches(&self, template: &RuleTemplate) -> bool {
        name_matches(&template.name, self.name.as_deref())
    }
}
