//! HTTP API.
//!
//! Provides endpoints for:
//! - Tasks and their priority logs (`/api/v1/tasks`)
//! - Batch and conditional priority updates (`/api/v1/priority`)
//! - Rules, templates and groups (`/api/v1/rules`, `/api/v1/templates`, `/api/v1/groups`)
//! - Task stats (`/api/v1/stats`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod error;
mod handlers;
pub mod responses;

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Tasks
        .route(
            "/tasks",
            post(handlers::create_task).get(handlers::list_tasks),
        )
        .route(
            "/tasks/:id",
            get(handlers::get_task).delete(handlers::delete_task),
        )
        .route("/tasks/:id/status", put(handlers::update_status))
        .route("/tasks/:id/retry", post(handlers::retry_task))
        .route("/tasks/:id/priority", put(handlers::set_priority))
        .route("/tasks/:id/evaluate", post(handlers::evaluate_task))
        .route("/tasks/:id/priority-logs", get(handlers::priority_logs))
        // Bulk priority updates
        .route("/priority/batch", put(handlers::batch_priority))
        .route("/priority/condition", put(handlers::condition_priority))
        .route("/stats", get(handlers::get_stats))
        // Rules
        .route(
            "/rules",
            post(handlers::create_rule).get(handlers::list_rules),
        )
        .route(
            "/rules/:id",
            get(handlers::get_rule)
                .put(handlers::update_rule)
                .delete(handlers::delete_rule),
        )
        // Templates
        .route(
            "/templates",
            post(handlers::create_template).get(handlers::list_templates),
        )
        .route(
            "/templates/:id",
            get(handlers::get_template)
                .put(handlers::replace_template)
                .delete(handlers::delete_template),
        )
        .route(
            "/templates/:id/instantiate",
            post(handlers::instantiate_template),
        )
        // Groups
        .route(
            "/groups",
            post(handlers::create_group).get(handlers::list_groups),
        )
        .route(
            "/groups/:id",
            get(handlers::get_group)
                .put(handlers::update_group)
                .delete(handlers::delete_group),
        )
        .route(
            "/groups/:id/rules",
            get(handlers::group_rules).post(handlers::add_rule_to_group),
        )
        .route(
            "/groups/:id/rules/:rule_id",
            axum::routing::delete(handlers::remove_rule_from_group),
        )
}

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes())
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn app() -> Router {
        create_router(AppState::new(Config::default()))
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_metrics_is_text() {
        let app = app();
        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn test_rule_then_task_flow() {
        let app = app();

        let (status, rule) = send(
            &app,
            "POST",
            "/api/v1/rules",
            Some(json!({
                "name": "bump translations",
                "conditions": [{"field": "type", "operator": "eq", "value": "translation"}],
                "actions": [{"type": "increment_priority", "value": 3}],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let rule_id = rule["id"].as_str().unwrap().to_string();

        let (status, task) = send(
            &app,
            "POST",
            "/api/v1/tasks",
            Some(json!({"type": "translation", "content": "hola", "priority": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["priority"], 8);
        let task_id = task["id"].as_str().unwrap().to_string();

        let (status, logs) = send(
            &app,
            "GET",
            &format!("/api/v1/tasks/{task_id}/priority-logs"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logs["total"], 1);
        assert_eq!(logs["items"][0]["old_priority"], 5);
        assert_eq!(logs["items"][0]["new_priority"], 8);
        assert_eq!(logs["items"][0]["reason"], rule_id.as_str());
    }

    #[tokio::test]
    async fn test_catch_all_rule_reports_warning() {
        let app = app();
        let (status, rule) = send(
            &app,
            "POST",
            "/api/v1/rules",
            Some(json!({"name": "floor", "actions": [{"type": "set_priority", "value": 0}]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(rule["warnings"][0]["kind"], "catch_all");
    }

    #[tokio::test]
    async fn test_invalid_rule_is_unprocessable() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/rules",
            Some(json!({"name": "nothing", "actions": []})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("action"));
    }

    #[tokio::test]
    async fn test_batch_reports_partial_failure() {
        let app = app();
        let (_, task) = send(
            &app,
            "POST",
            "/api/v1/tasks",
            Some(json!({"type": "content_generation", "content": "x"})),
        )
        .await;
        let task_id = task["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "PUT",
            "/api/v1/priority/batch",
            Some(json!({"ids": [task_id, "missing"], "priority": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "1 succeeded, 1 failed");
        assert_eq!(body["failed"][0]["task_id"], "missing");
        assert_eq!(body["succeeded"][0]["new_priority"], 2);
    }

    #[tokio::test]
    async fn test_condition_update() {
        let app = app();
        for priority in [1, 2] {
            send(
                &app,
                "POST",
                "/api/v1/tasks",
                Some(json!({"type": "translation", "priority": priority, "work_id": "w1"})),
            )
            .await;
        }

        let (status, body) = send(
            &app,
            "PUT",
            "/api/v1/priority/condition",
            Some(json!({
                "condition": {"field": "priority", "operator": "gte", "value": 2},
                "priority": 10,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["succeeded"].as_array().unwrap().len(), 1);

        let (_, page) = send(&app, "GET", "/api/v1/tasks?min_priority=5&page=1&size=10", None).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["priority"], 10);

        let (_, stats) = send(&app, "GET", "/api/v1/stats?work_id=w1", None).await;
        assert_eq!(stats["total"], 2);
        assert_eq!(stats["pending"], 2);
    }

    #[tokio::test]
    async fn test_group_membership_endpoints() {
        let app = app();
        let (_, rule) = send(
            &app,
            "POST",
            "/api/v1/rules",
            Some(json!({"name": "r", "actions": [{"type": "set_priority", "value": 1}]})),
        )
        .await;
        let rule_id = rule["id"].as_str().unwrap().to_string();

        let (status, group) = send(
            &app,
            "POST",
            "/api/v1/groups",
            Some(json!({"name": "g", "enabled": false})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let group_id = group["id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/groups/{group_id}/rules");
        let (_, added) = send(&app, "POST", &uri, Some(json!({"rule_id": rule_id}))).await;
        assert_eq!(added["changed"], true);
        let (_, again) = send(&app, "POST", &uri, Some(json!({"rule_id": rule_id}))).await;
        assert_eq!(again["changed"], false);

        let (_, members) = send(&app, "GET", &uri, None).await;
        assert_eq!(members.as_array().unwrap().len(), 1);

        let member_uri = format!("{uri}/{rule_id}");
        let (status, _) = send(&app, "DELETE", &member_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, removed) = send(&app, "DELETE", &member_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(removed["changed"], false);

        let (status, _) = send(&app, "DELETE", "/api/v1/groups/missing/rules/x", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stale_rule_update_conflicts() {
        let app = app();
        let (_, rule) = send(
            &app,
            "POST",
            "/api/v1/rules",
            Some(json!({"name": "r", "actions": [{"type": "set_priority", "value": 1}]})),
        )
        .await;
        let uri = format!("/api/v1/rules/{}", rule["id"].as_str().unwrap());

        let (status, updated) = send(
            &app,
            "PUT",
            &uri,
            Some(json!({"enabled": false, "expected_version": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["version"], 2);

        let (status, _) = send(
            &app,
            "PUT",
            &uri,
            Some(json!({"enabled": true, "expected_version": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_template_instantiation() {
        let app = app();
        let (status, template) = send(
            &app,
            "POST",
            "/api/v1/templates",
            Some(json!({
                "name": "cap",
                "conditions": [{"field": "priority", "operator": "gt", "value": 50}],
                "actions": [{"type": "set_priority", "value": 50}],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!(
            "/api/v1/templates/{}/instantiate",
            template["id"].as_str().unwrap()
        );
        let (status, rule) = send(&app, "POST", &uri, Some(json!({"name": "cap at 50"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(rule["name"], "cap at 50");
        assert_eq!(rule["conditions"][0]["operator"], "gt");

        let (_, rules) = send(&app, "GET", "/api/v1/rules?name=cap", None).await;
        assert_eq!(rules["total"], 1);
    }

    #[tokio::test]
    async fn test_unknown_task_is_not_found() {
        let app = app();
        let (status, body) = send(&app, "GET", "/api/v1/tasks/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Task not found: nope");
    }
}
