//! Bulk priority handlers.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::engine::RuleEngine;
use crate::http::error::ApiResult;
use crate::http::responses::{BatchPriorityRequest, BatchResponse, ConditionPriorityRequest};
use crate::state::AppState;

/// Set one priority on an explicit list of tasks.
pub async fn batch_priority(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchPriorityRequest>,
) -> ApiResult<Json<BatchResponse>> {
    let cancel = state.shutdown.child_token();
    let outcome = RuleEngine::new(state)
        .evaluate_batch(&req.ids, req.priority, &cancel)
        .await?;
    Ok(Json(outcome.into()))
}

/// Set one priority on every task matching a condition.
pub async fn condition_priority(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConditionPriorityRequest>,
) -> ApiResult<Json<BatchResponse>> {
    let cancel = state.shutdown.child_token();
    let outcome = RuleEngine::new(state)
        .evaluate_by_condition(&req.condition, req.priority, &cancel)
        .await?;
    Ok(Json(outcome.into()))
}
