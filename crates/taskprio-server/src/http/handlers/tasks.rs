//! Task handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use taskprio_core::{Page, Pagination, PriorityLogEntry, Task, TaskFilter, TaskId};

use crate::engine::{Evaluation, RuleEngine, TaskUpdate};
use crate::http::error::ApiResult;
use crate::http::responses::SetPriorityRequest;
use crate::lifecycle::{NewTask, StatusUpdate, TaskService};
use crate::state::AppState;

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = TaskService::new(state).create(req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TaskFilter>,
    Query(pagination): Query<Pagination>,
) -> Json<Page<Task>> {
    Json(TaskService::new(state).list(&filter, &pagination).await)
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let task = TaskService::new(state).get(&TaskId::new(id)).await?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let task = TaskService::new(state).delete(&TaskId::new(id)).await?;
    Ok(Json(task))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdate>,
) -> ApiResult<Json<Task>> {
    let task = TaskService::new(state)
        .update_status(&TaskId::new(id), req)
        .await?;
    Ok(Json(task))
}

pub async fn retry_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let task = TaskService::new(state).retry(&TaskId::new(id)).await?;
    Ok(Json(task))
}

/// Set one task's priority directly.
pub async fn set_priority(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetPriorityRequest>,
) -> ApiResult<Json<TaskUpdate>> {
    let update = RuleEngine::new(state)
        .update_priority(&TaskId::new(id), req.priority)
        .await?;
    Ok(Json(update))
}

/// Run the active rules over one task now.
pub async fn evaluate_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Evaluation>> {
    let evaluation = RuleEngine::new(state)
        .evaluate_task(&TaskId::new(id))
        .await?;
    Ok(Json(evaluation))
}

/// Priority log of one task, oldest first.
///
/// Entries outlive the task, so a deleted task's history is still served.
pub async fn priority_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Json<Page<PriorityLogEntry>> {
    let page = state
        .ledger
        .page_by_task(
            &TaskId::new(id),
            &pagination,
            state.config.default_page_size,
            state.config.max_page_size,
        )
        .await;
    Json(page)
}
