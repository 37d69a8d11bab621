use crate::AppState;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub content_store: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let content_store = if state.store.health_check().await {
        "connected"
    } else {
        "disconnected"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        content_store: content_store.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `302 Found` to the API documentation.
pub async fn root() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/swagger-ui")])
}
