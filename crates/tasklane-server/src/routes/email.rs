use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::{ok, ok_message, parse_id, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks/{id}/reminder", post(send_reminder))
        .route("/api/email/test", post(send_test))
        .route("/api/email/status", get(email_status))
}

#[derive(Debug, Deserialize)]
struct Recipient {
    #[serde(default)]
    to: String,
}

async fn send_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    input: Result<Json<Recipient>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let task_id = parse_id(&id, "Task not found")?;
    let Json(input) = input?;
    state.tasks.send_task_reminder(task_id, &input.to).await?;
    Ok(ok_message("Reminder email sent successfully"))
}

async fn send_test(
    State(state): State<AppState>,
    input: Result<Json<Recipient>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = input?;
    state.tasks.send_test_email(&input.to).await?;
    Ok(ok_message("Test email sent successfully"))
}

async fn email_status(State(state): State<AppState>) -> Json<Value> {
    ok(state.tasks.email_status().await)
}
