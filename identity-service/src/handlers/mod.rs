pub mod auth;
pub mod team;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let cache_ok = state.auth.cache_health().await.is_ok();

    let status = if cache_ok { "ok" } else { "degraded" };
    let code = if cache_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": state.config.service_name,
            "version": state.config.service_version,
            "cache": cache_ok,
        })),
    )
}
