use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde_json::Value;

use super::{ok, ok_message, ApiError, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/cache/status", get(cache_status))
        .route("/api/cache/clear", delete(clear_cache))
}

async fn cache_status(State(state): State<AppState>) -> Json<Value> {
    ok(state.tasks.cache_status())
}

async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    if state.tasks.clear_cache().await {
        Ok(ok_message("Cache cleared successfully"))
    } else {
        Err(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Cache is unavailable"))
    }
}
