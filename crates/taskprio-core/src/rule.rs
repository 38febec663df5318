//! Priority rules, rule templates and rule groups.

use crate::action::{BoundsMode, PriorityBounds, RuleAction};
use crate::condition::RuleCondition;
use crate::{CoreError, GroupId, RuleId, Task, TemplateId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A persistent, named condition/action rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRule {
    pub id: RuleId,
    pub name: String,
    pub description: String,
    /// All must hold. Empty means the rule matches every task.
    pub conditions: Vec<RuleCondition>,
    /// Applied in order, each consuming the previous result.
    pub actions: Vec<RuleAction>,
    pub enabled: bool,
    /// Bumped on every update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PriorityRule {
    /// Build a rule from an already validated spec.
    pub fn from_spec(spec: RuleSpec) -> Self {
        let now = Utc::now();
        Self {
            id: RuleId::generate(),
            name: spec.name,
            description: spec.description,
            conditions: spec.conditions,
            actions: spec.actions,
            enabled: spec.enabled,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the rule's conditions hold for `task`.
    pub fn matches(&self, task: &Task) -> bool {
        crate::condition::matches_all(&self.conditions, task)
    }

    /// A rule without conditions matches every task.
    pub fn is_catch_all(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Apply a patch in place. The caller validates the result.
    pub fn apply_patch(&mut self, patch: RulePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(conditions) = patch.conditions {
            self.conditions = conditions;
        }
        if let Some(actions) = patch.actions {
            self.actions = actions;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

fn default_enabled() -> bool {
    true
}

/// Input for creating a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl RuleSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            conditions: Vec::new(),
            actions: Vec::new(),
            enabled: true,
        }
    }

    pub fn when(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn then(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Partial update of a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub conditions: Option<Vec<RuleCondition>>,
    pub actions: Option<Vec<RuleAction>>,
    pub enabled: Option<bool>,
    /// Fail with `ConcurrentModification` unless the stored version matches.
    pub expected_version: Option<u64>,
}

/// Non-fatal findings about a rule definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleWarning {
    /// No conditions: the rule applies to every task.
    CatchAll,
    /// A condition names a field tasks don't have; it never matches.
    UnknownField { field: String },
}

impl fmt::Display for RuleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CatchAll => f.write_str("rule has no conditions and will match every task"),
            Self::UnknownField { field } => {
                write!(f, "condition on unknown field '{field}' will never match")
            }
        }
    }
}

/// Check a rule or template definition.
///
/// Hard errors: blank name, no actions, negative increment/decrement, and
/// `set_priority` outside the bounds when the bounds reject.
pub fn validate_definition(
    name: &str,
    conditions: &[RuleCondition],
    actions: &[RuleAction],
    bounds: &PriorityBounds,
) -> Result<Vec<RuleWarning>, CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::InvalidRule("name is required".into()));
    }
    if actions.is_empty() {
        return Err(CoreError::InvalidRule(
            "at least one action is required".into(),
        ));
    }

    for action in actions {
        match *action {
            RuleAction::IncrementPriority { value } | RuleAction::DecrementPriority { value }
                if value < 0 =>
            {
                return Err(CoreError::InvalidRule(format!(
                    "{} value must not be negative, got {value}",
                    action.kind()
                )));
            }
            RuleAction::SetPriority { value }
                if bounds.mode == BoundsMode::Reject && !bounds.contains(value) =>
            {
                return Err(CoreError::InvalidRule(format!(
                    "set_priority {value} outside allowed range {}..={}",
                    bounds.min, bounds.max
                )));
            }
            _ => {}
        }
    }

    let mut warnings = Vec::new();
    if conditions.is_empty() {
        warnings.push(RuleWarning::CatchAll);
    }
    for condition in conditions {
        if !Task::FIELDS.contains(&condition.field()) {
            warnings.push(RuleWarning::UnknownField {
                field: condition.field().to_string(),
            });
        }
    }
    Ok(warnings)
}

/// A stamp for creating rules with pre-filled conditions and actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub id: TemplateId,
    pub name: String,
    pub description: String,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RuleTemplate {
    pub fn from_spec(spec: TemplateSpec) -> Self {
        let now = Utc::now();
        Self {
            id: TemplateId::generate(),
            name: spec.name,
            description: spec.description,
            conditions: spec.conditions,
            actions: spec.actions,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the definition, keeping identity and creation time.
    pub fn replace(&mut self, spec: TemplateSpec) {
        self.name = spec.name;
        self.description = spec.description;
        self.conditions = spec.conditions;
        self.actions = spec.actions;
        self.updated_at = Utc::now();
    }

    /// Produce a rule spec stamped from this template.
    pub fn instantiate(&self, overrides: Instantiation) -> RuleSpec {
        RuleSpec {
            name: overrides.name.unwrap_or_else(|| self.name.clone()),
            description: overrides
                .description
                .unwrap_or_else(|| self.description.clone()),
            conditions: self.conditions.clone(),
            actions: self.actions.clone(),
            enabled: overrides.enabled.unwrap_or(true),
        }
    }
}

/// Input for creating or replacing a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
}

/// Overrides applied when stamping a rule out of a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instantiation {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
}

/// A named collection of rules with a master switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    /// Member rules, in insertion order. No duplicates.
    pub rule_ids: Vec<RuleId>,
    pub enabled: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RuleGroup {
    pub fn from_spec(spec: GroupSpec) -> Self {
        let now = Utc::now();
        let mut group = Self {
            id: GroupId::generate(),
            name: spec.name,
            description: spec.description,
            rule_ids: Vec::with_capacity(spec.rule_ids.len()),
            enabled: spec.enabled,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        for rule_id in spec.rule_ids {
            group.insert_rule(rule_id);
        }
        group
    }

    pub fn contains(&self, rule_id: &RuleId) -> bool {
        self.rule_ids.contains(rule_id)
    }

    /// Add a member. Returns false if it was already present.
    pub fn insert_rule(&mut self, rule_id: RuleId) -> bool {
        if self.contains(&rule_id) {
            return false;
        }
        self.rule_ids.push(rule_id);
        true
    }

    /// Remove a member. Returns false if it was not present.
    pub fn remove_rule(&mut self, rule_id: &RuleId) -> bool {
        let before = self.rule_ids.len();
        self.rule_ids.retain(|id| id != rule_id);
        before != self.rule_ids.len()
    }

    /// Mark the group as modified.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// Input for creating a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rule_ids: Vec<RuleId>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl GroupSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            rule_ids: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_rule(mut self, rule_id: RuleId) -> Self {
        self.rule_ids.push(rule_id);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Partial update of a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    /// Replaces the full member list when present.
    pub rule_ids: Option<Vec<RuleId>>,
    pub expected_version: Option<u64>,
}
