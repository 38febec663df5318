//! Rule conditions and their evaluation against tasks.
//!
//! Each operator is its own variant with a typed operand, so a condition like
//! `gt "abc"` cannot be constructed. On the wire a condition keeps the
//! `{field, operator, value}` shape:
//!
//! ```json
//! {"field": "type", "operator": "eq", "value": "translation"}
//! {"field": "priority", "operator": "gte", "value": 3}
//! {"field": "status", "operator": "in", "value": ["pending", "processing"]}
//! ```
//!
//! Evaluation never fails. A field the task does not have, or an operand
//! whose type does not fit the field, makes the condition false.

use crate::task::{FieldValue, Task};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar operand for equality and set membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(i64),
    Text(String),
}

impl Scalar {
    /// Compare against a resolved field. `None` when the types don't line up.
    fn equals(&self, value: &FieldValue<'_>) -> Option<bool> {
        match (self, value) {
            (Self::Text(expected), FieldValue::Text(actual)) => Some(expected == actual),
            (Self::Number(expected), FieldValue::Number(actual)) => Some(expected == actual),
            _ => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// A single predicate over one task attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum RuleCondition {
    Eq { field: String, value: Scalar },
    Ne { field: String, value: Scalar },
    Gt { field: String, value: i64 },
    Gte { field: String, value: i64 },
    Lt { field: String, value: i64 },
    Lte { field: String, value: i64 },
    /// Substring for text fields, membership for list fields.
    Contains { field: String, value: String },
    /// The field value must be one of the listed scalars.
    In { field: String, value: Vec<Scalar> },
}

impl RuleCondition {
    pub fn eq(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: i64) -> Self {
        Self::Gt {
            field: field.into(),
            value,
        }
    }

    pub fn gte(field: impl Into<String>, value: i64) -> Self {
        Self::Gte {
            field: field.into(),
            value,
        }
    }

    pub fn lt(field: impl Into<String>, value: i64) -> Self {
        Self::Lt {
            field: field.into(),
            value,
        }
    }

    pub fn lte(field: impl Into<String>, value: i64) -> Self {
        Self::Lte {
            field: field.into(),
            value,
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self::In {
            field: field.into(),
            value: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Name of the attribute this condition reads.
    pub fn field(&self) -> &str {
        match self {
            Self::Eq { field, .. }
            | Self::Ne { field, .. }
            | Self::Gt { field, .. }
            | Self::Gte { field, .. }
            | Self::Lt { field, .. }
            | Self::Lte { field, .. }
            | Self::Contains { field, .. }
            | Self::In { field, .. } => field,
        }
    }

    /// Wire name of the operator.
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Eq { .. } => "eq",
            Self::Ne { .. } => "ne",
            Self::Gt { .. } => "gt",
            Self::Gte { .. } => "gte",
            Self::Lt { .. } => "lt",
            Self::Lte { .. } => "lte",
            Self::Contains { .. } => "contains",
            Self::In { .. } => "in",
        }
    }

    /// Evaluate this condition against a task.
    pub fn evaluate(&self, task: &Task) -> bool {
        let Some(actual) = task.field(self.field()) else {
            return false;
        };

        match self {
            Self::Eq { value, .. } => value.equals(&actual).unwrap_or(false),
            Self::Ne { value, .. } => value.equals(&actual).map(|eq| !eq).unwrap_or(false),
            Self::Gt { value, .. } => actual.as_number().is_some_and(|n| n > *value),
            Self::Gte { value, .. } => actual.as_number().is_some_and(|n| n >= *value),
            Self::Lt { value, .. } => actual.as_number().is_some_and(|n| n < *value),
            Self::Lte { value, .. } => actual.as_number().is_some_and(|n| n <= *value),
            Self::Contains { value, .. } => match actual {
                FieldValue::Text(text) => text.contains(value.as_str()),
                FieldValue::List(items) => items.iter().any(|item| item == value),
                FieldValue::Number(_) => false,
            },
            Self::In { value, .. } => value
                .iter()
                .any(|candidate| candidate.equals(&actual).unwrap_or(false)),
        }
    }
}

impl fmt::Display for RuleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq { field, value } | Self::Ne { field, value } => {
                write!(f, "{field} {} {value}", self.operator())
            }
            Self::Gt { field, value }
            | Self::Gte { field, value }
            | Self::Lt { field, value }
            | Self::Lte { field, value } => write!(f, "{field} {} {value}", self.operator()),
            Self::Contains { field, value } => write!(f, "{field} contains {value:?}"),
            Self::In { field, value } => {
                let items: Vec<String> = value.iter().map(ToString::to_string).collect();
                write!(f, "{field} in [{}]", items.join(", "))
            }
        }
    }
}

/// True when every condition holds. An empty list is vacuously true.
pub fn matches_all(conditions: &[RuleCondition], task: &Task) -> bool {
    conditions.iter().all(|condition| condition.evaluate(task))
}
