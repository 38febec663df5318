//! Rule group handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use taskprio_core::{
    GroupFilter, GroupId, GroupPatch, GroupSpec, Page, Pagination, PriorityRule, RuleGroup, RuleId,
};

use crate::engine::RuleEngine;
use crate::http::error::ApiResult;
use crate::http::responses::{AddRuleRequest, DeleteResponse, GroupResponse, MembershipResponse};
use crate::state::AppState;

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<GroupSpec>,
) -> ApiResult<(StatusCode, Json<GroupResponse>)> {
    let engine = RuleEngine::new(state.clone());
    let (group, reevaluation) = engine
        .mutate_and_reevaluate(|reg| reg.create_group(spec), &state.shutdown.child_token())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(GroupResponse {
            group,
            reevaluation,
        }),
    ))
}

pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<GroupFilter>,
    Query(pagination): Query<Pagination>,
) -> Json<Page<RuleGroup>> {
    let page = state.registry.read().await.list_groups(
        &filter,
        &pagination,
        state.config.default_page_size,
        state.config.max_page_size,
    );
    Json(page)
}

pub async fn get_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RuleGroup>> {
    let group = state.registry.read().await.get_group(&GroupId::new(id))?.clone();
    Ok(Json(group))
}

pub async fn update_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<GroupPatch>,
) -> ApiResult<Json<GroupResponse>> {
    let id = GroupId::new(id);
    let engine = RuleEngine::new(state.clone());
    let (group, reevaluation) = engine
        .mutate_and_reevaluate(
            |reg| reg.update_group(&id, patch),
            &state.shutdown.child_token(),
        )
        .await?;
    Ok(Json(GroupResponse {
        group,
        reevaluation,
    }))
}

/// Delete a group. Member rules are kept.
pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = GroupId::new(id);
    let engine = RuleEngine::new(state.clone());
    let (_, reevaluation) = engine
        .mutate_and_reevaluate(|reg| reg.delete_group(&id), &state.shutdown.child_token())
        .await?;
    Ok(Json(DeleteResponse {
        id: id.into_inner(),
        reevaluation,
    }))
}

pub async fn group_rules(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PriorityRule>>> {
    let rules = state.registry.read().await.group_rules(&GroupId::new(id))?;
    Ok(Json(rules))
}

/// Add a rule to a group. Adding an existing member succeeds unchanged.
pub async fn add_rule_to_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddRuleRequest>,
) -> ApiResult<Json<MembershipResponse>> {
    let group_id = GroupId::new(id);
    let engine = RuleEngine::new(state.clone());
    let (added, _) = engine
        .mutate_and_reevaluate(
            |reg| reg.add_rule_to_group(&group_id, &req.rule_id),
            &state.shutdown.child_token(),
        )
        .await?;

    Ok(Json(MembershipResponse {
        group_id: group_id.into_inner(),
        rule_id: req.rule_id,
        changed: added,
    }))
}

/// Remove a rule from a group. Removing a non-member succeeds unchanged.
pub async fn remove_rule_from_group(
    State(state): State<Arc<AppState>>,
    Path((id, rule_id)): Path<(String, String)>,
) -> ApiResult<Json<MembershipResponse>> {
    let group_id = GroupId::new(id);
    let rule_id = RuleId::new(rule_id);
    let engine = RuleEngine::new(state.clone());
    let (removed, _) = engine
        .mutate_and_reevaluate(
            |reg| reg.remove_rule_from_group(&group_id, &rule_id),
            &state.shutdown.child_token(),
        )
        .await?;

    Ok(Json(MembershipResponse {
        group_id: group_id.into_inner(),
        rule_id,
        changed: removed,
    }))
}
