use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use tasklane_core::user::Claims;

use super::{ok, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

/// Routes that always need a bearer token.
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn register(
    State(state): State<AppState>,
    input: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(input) = input?;
    let session = state.auth.register(&input.username, &input.password).await?;
    Ok((StatusCode::CREATED, ok(session)))
}

async fn login(
    State(state): State<AppState>,
    input: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = input?;
    Ok(ok(state.auth.login(&input.username, &input.password).await?))
}

async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    Ok(ok(state.auth.current_user(&claims).await?))
}
