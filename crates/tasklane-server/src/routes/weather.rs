use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;

use tasklane_service::ServiceError;

use super::{ok, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/weather/{city}", get(get_weather))
}

async fn get_weather(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> ApiResult<Json<Value>> {
    let client = state
        .weather
        .as_ref()
        .ok_or_else(|| ServiceError::Unavailable("Weather service is not configured".into()))?;
    let city = city.trim();
    if city.is_empty() {
        return Err(ServiceError::InvalidInput("City is required".into()).into());
    }
    let weather = client.get_weather(city).await.map_err(ServiceError::from)?;
    Ok(ok(weather))
}
