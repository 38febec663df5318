//! Health, metrics and stats handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use taskprio_core::TaskStats;

use crate::http::responses::StatsQuery;
use crate::state::AppState;

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rules = state.registry.read().await.rule_count();
    Json(serde_json::json!({
        "status": "ok",
        "tasks": state.task_count().await,
        "rules": rules,
    }))
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = crate::metrics::collect_metrics(&state).await;
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

/// Task counts, optionally scoped to one work id.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Json<TaskStats> {
    let stats = match query.work_id.as_deref() {
        Some(work_id) if !work_id.is_empty() => state.store.stats_for_work(work_id).await,
        _ => state.store.stats().await,
    };
    Json(stats)
}
