//! Rule template handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use taskprio_core::{
    Instantiation, Page, Pagination, RuleTemplate, TemplateFilter, TemplateId, TemplateSpec,
};

use super::rules::commit_rule;
use crate::http::error::ApiResult;
use crate::http::responses::{DeleteResponse, RuleResponse};
use crate::state::AppState;

pub async fn create_template(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<TemplateSpec>,
) -> ApiResult<(StatusCode, Json<RuleTemplate>)> {
    let template = state.registry.write().await.create_template(spec)?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TemplateFilter>,
    Query(pagination): Query<Pagination>,
) -> Json<Page<RuleTemplate>> {
    let page = state.registry.read().await.list_templates(
        &filter,
        &pagination,
        state.config.default_page_size,
        state.config.max_page_size,
    );
    Json(page)
}

pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RuleTemplate>> {
    let template = state
        .registry
        .read()
        .await
        .get_template(&TemplateId::new(id))?
        .clone();
    Ok(Json(template))
}

/// Replace a template's definition. Rules made from it are untouched.
pub async fn replace_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(spec): Json<TemplateSpec>,
) -> ApiResult<Json<RuleTemplate>> {
    let template = state
        .registry
        .write()
        .await
        .replace_template(&TemplateId::new(id), spec)?;
    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let template = state
        .registry
        .write()
        .await
        .delete_template(&TemplateId::new(id))?;
    Ok(Json(DeleteResponse {
        id: template.id.into_inner(),
        reevaluation: None,
    }))
}

/// Create a rule from a template.
pub async fn instantiate_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(overrides): Json<Instantiation>,
) -> ApiResult<(StatusCode, Json<RuleResponse>)> {
    let id = TemplateId::new(id);
    let response =
        commit_rule(&state, |reg| reg.instantiate_template(&id, overrides)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
