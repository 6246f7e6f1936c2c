pub mod attachments;
pub mod auth;
pub mod cache;
pub mod email;
pub mod health;
pub mod tasks;
pub mod weather;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{middleware, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use tasklane_adapters::WeatherClient;
use tasklane_service::{AuthService, Cached, ServiceError, TaskService, MAX_ATTACHMENT_BYTES};

use crate::auth::auth_middleware;

/// Request bodies may carry one attachment plus multipart framing.
pub const BODY_LIMIT: usize = MAX_ATTACHMENT_BYTES + 1024 * 1024;

pub struct InnerAppState {
    pub tasks: TaskService,
    pub auth: AuthService,
    pub weather: Option<WeatherClient>,
    /// Guard the task, attachment, cache, email and weather routes.
    pub require_auth: bool,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .merge(health::routes())
        .merge(auth::routes());

    let session = auth::protected_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    let mut api = Router::new()
        .merge(tasks::routes())
        .merge(attachments::routes())
        .merge(cache::routes())
        .merge(email::routes())
        .merge(weather::routes());
    if state.require_auth {
        api = api.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));
    }

    public
        .merge(session)
        .merge(api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

// -- Response envelope --

/// Failure half of the `{success, error}` envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let status = match &e {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Upstream(inner) if inner.is_not_found() => StatusCode::NOT_FOUND,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %e, status = status.as_u16(), "request failed");
        }
        Self::new(status, e.message())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

pub fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

pub fn ok_cached<T: Serialize>(result: Cached<T>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": result.value,
        "cached": result.from_cache,
    }))
}

pub fn ok_message(message: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}

/// Ids are numeric; anything else can never name a row.
pub fn parse_id(raw: &str, not_found: &str) -> ApiResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::not_found(not_found))
}
