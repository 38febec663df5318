//! HTTP request and response types.

use serde::{Deserialize, Serialize};

use taskprio_core::{PriorityRule, RuleCondition, RuleGroup, RuleId, RuleWarning, TaskId};

use crate::engine::{BatchOutcome, ReevaluationSummary};

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Priority updates
// ============================================================================

/// Body for setting one task's priority.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetPriorityRequest {
    pub priority: i32,
}

/// Body for a batch update over explicit ids.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchPriorityRequest {
    pub ids: Vec<TaskId>,
    pub priority: i32,
}

/// Body for an update over every task matching one condition.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConditionPriorityRequest {
    pub condition: RuleCondition,
    pub priority: i32,
}

/// Batch or conditional update result.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    #[serde(flatten)]
    pub outcome: BatchOutcome,
    /// "N succeeded, M failed".
    pub summary: String,
}

impl From<BatchOutcome> for BatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        let summary = outcome.summary();
        Self { outcome, summary }
    }
}

// ============================================================================
// Rules and groups
// ============================================================================

/// A rule with validation warnings and, when the change affected
/// evaluation, the re-evaluation it triggered.
#[derive(Debug, Serialize)]
pub struct RuleResponse {
    #[serde(flatten)]
    pub rule: PriorityRule,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RuleWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reevaluation: Option<ReevaluationSummary>,
}

/// A group and, when the change affected evaluation, the re-evaluation it
/// triggered.
#[derive(Debug, Serialize)]
pub struct GroupResponse {
    #[serde(flatten)]
    pub group: RuleGroup,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reevaluation: Option<ReevaluationSummary>,
}

/// Body for adding a rule to a group.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddRuleRequest {
    pub rule_id: RuleId,
}

/// Result of adding or removing a group member.
#[derive(Debug, Serialize, Deserialize)]
pub struct MembershipResponse {
    pub group_id: String,
    pub rule_id: RuleId,
    /// False when the call was a no-op.
    pub changed: bool,
}

/// Result of a delete that may have triggered re-evaluation.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reevaluation: Option<ReevaluationSummary>,
}

// ============================================================================
// Stats
// ============================================================================

/// Query for the stats endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub work_id: Option<String>,
}
