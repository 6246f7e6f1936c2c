use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;

use tasklane_core::task::{CreateTask, UpdateTask};

use super::{ok, ok_cached, ok_message, parse_id, ApiResult, AppState};

const TASK_NOT_FOUND: &str = "Task not found";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(ok_cached(state.tasks.list_tasks().await?))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, TASK_NOT_FOUND)?;
    Ok(ok_cached(state.tasks.get_task(id).await?))
}

async fn create_task(
    State(state): State<AppState>,
    input: Result<Json<CreateTask>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(input) = input?;
    let task = state.tasks.create_task(&input).await?;
    Ok((StatusCode::CREATED, ok(task)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    input: Result<Json<UpdateTask>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, TASK_NOT_FOUND)?;
    let Json(input) = input?;
    Ok(ok(state.tasks.update_task(id, &input).await?))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, TASK_NOT_FOUND)?;
    state.tasks.delete_task(id).await?;
    Ok(ok_message("Task deleted successfully"))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::test_helpers::test_router;

    async fn call(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn cached_flag_follows_reads_and_writes() {
        let app = test_router().await;

        let (status, body) = call(&app, "POST", "/api/tasks", Some(json!({"title": "Buy milk"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "pending");
        let id = body["data"]["id"].as_i64().unwrap();

        let (_, first) = call(&app, "GET", "/api/tasks", None).await;
        assert_eq!(first["cached"], false);
        assert_eq!(first["data"].as_array().unwrap().len(), 1);
        let (_, second) = call(&app, "GET", "/api/tasks", None).await;
        assert_eq!(second["cached"], true);
        assert_eq!(second["data"], first["data"]);

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/tasks/{id}"),
            Some(json!({"status": "completed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "completed");
        assert_eq!(body["data"]["title"], "Buy milk");

        let (_, body) = call(&app, "GET", &format!("/api/tasks/{id}"), None).await;
        assert_eq!(body["data"]["status"], "completed");
        assert_eq!(body["cached"], false);
        let (_, body) = call(&app, "GET", &format!("/api/tasks/{id}"), None).await;
        assert_eq!(body["cached"], true);

        let (status, body) = call(&app, "DELETE", &format!("/api/tasks/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Task deleted successfully");

        let (status, body) = call(&app, "GET", &format!("/api/tasks/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"success": false, "error": "Task not found"}));
    }

    #[tokio::test]
    async fn validation_and_missing_rows() {
        let app = test_router().await;

        let (status, body) = call(&app, "POST", "/api/tasks", Some(json!({"title": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title is required");

        let (status, body) = call(&app, "POST", "/api/tasks", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = call(&app, "PUT", "/api/tasks/99", Some(json!({"title": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Task not found");

        let (status, _) = call(&app, "PUT", "/api/tasks/1", Some(json!({"status": "archived"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call(&app, "DELETE", "/api/tasks/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, "GET", "/api/tasks/not-a-number", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_a_client_error() {
        let app = test_router().await;
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
    }
}
