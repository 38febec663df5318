//! Rule handlers.
//!
//! Mutations that change what evaluation would do re-run the rules over
//! every active task before responding.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use taskprio_core::{
    CoreError, Page, Pagination, PriorityRule, RuleFilter, RuleId, RulePatch, RuleSpec,
};

use crate::engine::RuleEngine;
use crate::http::error::ApiResult;
use crate::http::responses::{DeleteResponse, RuleResponse};
use crate::registry::{RuleRegistry, Validated};
use crate::state::AppState;

/// Run a rule mutation, re-evaluating active tasks if it changed what
/// evaluation would do.
pub(super) async fn commit_rule<F>(
    state: &Arc<AppState>,
    mutate: F,
) -> ApiResult<RuleResponse>
where
    F: FnOnce(&mut RuleRegistry) -> Result<Validated<PriorityRule>, CoreError>,
{
    let engine = RuleEngine::new(state.clone());
    let (validated, reevaluation) = engine
        .mutate_and_reevaluate(mutate, &state.shutdown.child_token())
        .await?;
    Ok(RuleResponse {
        rule: validated.item,
        warnings: validated.warnings,
        reevaluation,
    })
}

pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<RuleSpec>,
) -> ApiResult<(StatusCode, Json<RuleResponse>)> {
    let response = commit_rule(&state, |reg| reg.create_rule(spec)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RuleFilter>,
    Query(pagination): Query<Pagination>,
) -> Json<Page<PriorityRule>> {
    let page = state.registry.read().await.list_rules(
        &filter,
        &pagination,
        state.config.default_page_size,
        state.config.max_page_size,
    );
    Json(page)
}

pub async fn get_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<PriorityRule>> {
    let rule = state.registry.read().await.get_rule(&RuleId::new(id))?.clone();
    Ok(Json(rule))
}

pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<RulePatch>,
) -> ApiResult<Json<RuleResponse>> {
    let id = RuleId::new(id);
    Ok(Json(commit_rule(&state, |reg| reg.update_rule(&id, patch)).await?))
}

pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = RuleId::new(id);
    let engine = RuleEngine::new(state.clone());
    let (_, reevaluation) = engine
        .mutate_and_reevaluate(|reg| reg.delete_rule(&id), &state.shutdown.child_token())
        .await?;
    Ok(Json(DeleteResponse {
        id: id.into_inner(),
        reevaluation,
    }))
}
