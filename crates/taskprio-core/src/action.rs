//! Rule actions and priority bounds.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A priority adjustment performed when a rule matches.
///
/// Wire shape: `{"type": "increment_priority", "value": 3}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Replace the priority with an absolute value.
    SetPriority { value: i32 },
    /// Raise the priority by `value`.
    IncrementPriority { value: i32 },
    /// Lower the priority by `value`.
    DecrementPriority { value: i32 },
}

impl RuleAction {
    /// Wire name of the action type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetPriority { .. } => "set_priority",
            Self::IncrementPriority { .. } => "increment_priority",
            Self::DecrementPriority { .. } => "decrement_priority",
        }
    }

    /// Apply this action to `current`, clamped to `bounds`.
    pub fn apply(&self, current: i32, bounds: &PriorityBounds) -> i32 {
        let raw = match *self {
            Self::SetPriority { value } => value,
            Self::IncrementPriority { value } => current.saturating_add(value),
            Self::DecrementPriority { value } => current.saturating_sub(value),
        };
        bounds.clamp(raw)
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetPriority { value } => write!(f, "set {value}"),
            Self::IncrementPriority { value } => write!(f, "+{value}"),
            Self::DecrementPriority { value } => write!(f, "-{value}"),
        }
    }
}

/// Left-fold a sequence of actions over a starting priority.
pub fn apply_all(current: i32, actions: &[RuleAction], bounds: &PriorityBounds) -> i32 {
    actions
        .iter()
        .fold(current, |priority, action| action.apply(priority, bounds))
}

/// What happens to an explicit priority outside the bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsMode {
    /// Silently clamp into range.
    #[default]
    Clamp,
    /// Reject explicit values (direct updates, `set_priority` actions) outside the range.
    Reject,
}

/// Valid priority range. Arithmetic results are always clamped into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBounds {
    pub min: i32,
    pub max: i32,
    #[serde(default)]
    pub mode: BoundsMode,
}

impl PriorityBounds {
    pub fn new(min: i32, max: i32, mode: BoundsMode) -> Result<Self, CoreError> {
        if min > max {
            return Err(CoreError::InvalidInput(format!(
                "priority bounds are empty: min {min} > max {max}"
            )));
        }
        Ok(Self { min, max, mode })
    }

    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Resolve an explicitly requested priority according to the mode.
    pub fn resolve(&self, value: i32) -> Result<i32, CoreError> {
        match self.mode {
            BoundsMode::Clamp => Ok(self.clamp(value)),
            BoundsMode::Reject if self.contains(value) => Ok(value),
            BoundsMode::Reject => Err(CoreError::InvalidPriority {
                value,
                min: self.min,
                max: self.max,
            }),
        }
    }
}

impl Default for PriorityBounds {
    fn default() -> Self {
        Self {
            min: 0,
            max: 100,
            mode: BoundsMode::Clamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_each_kind() {
        let bounds = PriorityBounds::default();
        assert_eq!(RuleAction::SetPriority { value: 7 }.apply(1, &bounds), 7);
        assert_eq!(RuleAction::IncrementPriority { value: 3 }.apply(5, &bounds), 8);
        assert_eq!(RuleAction::DecrementPriority { value: 2 }.apply(5, &bounds), 3);
    }

    #[test]
    fn test_clamping_is_silent() {
        let bounds = PriorityBounds::new(0, 10, BoundsMode::Clamp).unwrap();
        assert_eq!(RuleAction::DecrementPriority { value: 4 }.apply(2, &bounds), 0);
        assert_eq!(RuleAction::IncrementPriority { value: 50 }.apply(2, &bounds), 10);
        assert_eq!(RuleAction::SetPriority { value: -3 }.apply(2, &bounds), 0);
        assert_eq!(
            RuleAction::IncrementPriority { value: i32::MAX }.apply(i32::MAX, &bounds),
            10
        );
    }

    #[test]
    fn test_actions_chain_in_order() {
        let bounds = PriorityBounds::new(0, 10, BoundsMode::Clamp).unwrap();
        let actions = [
            RuleAction::IncrementPriority { value: 9 },
            RuleAction::DecrementPriority { value: 3 },
        ];
        // 5 + 9 clamps to 10 before the decrement.
        assert_eq!(apply_all(5, &actions, &bounds), 7);
        assert_eq!(apply_all(5, &[], &bounds), 5);
    }

    #[test]
    fn test_resolve_modes() {
        let clamp = PriorityBounds::new(0, 3, BoundsMode::Clamp).unwrap();
        assert_eq!(clamp.resolve(9), Ok(3));

        let reject = PriorityBounds::new(0, 3, BoundsMode::Reject).unwrap();
        assert_eq!(reject.resolve(2), Ok(2));
        assert_eq!(
            reject.resolve(9),
            Err(CoreError::InvalidPriority { value: 9, min: 0, max: 3 })
        );
    }

    #[test]
    fn test_empty_bounds_rejected() {
        assert!(PriorityBounds::new(5, 1, BoundsMode::Clamp).is_err());
    }

    #[test]
    fn test_wire_shape() {
        let action: RuleAction =
            serde_json::from_str(r#"{"type":"increment_priority","value":3}"#).unwrap();
        assert_eq!(action, RuleAction::IncrementPriority { value: 3 });
        assert!(serde_json::from_str::<RuleAction>(r#"{"type":"boost","value":3}"#).is_err());
    }
}
