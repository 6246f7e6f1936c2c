use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::routes::AppState;

/// The token from an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

/// Axum middleware that requires a valid session token.
///
/// A missing token is answered with 401, a token that fails verification with
/// 403. On success the decoded `Claims` are stored in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Some(t) => t.to_string(),
        None => return reject(StatusCode::UNAUTHORIZED, "Access token required"),
    };

    match state.auth.verify_token(&token) {
        Ok(claims) => {
            debug!(user_id = claims.user_id, "request authenticated");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => reject(StatusCode::FORBIDDEN, &e.message()),
    }
}
