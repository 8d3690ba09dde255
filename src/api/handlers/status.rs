//! Status and frontend log handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::api::ApiState;
use crate::cache::CacheStats;
use crate::commands::{self, FrontendLog};

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,

    /// Crate version.
    pub version: String,

    /// Reader cache usage.
    pub cache: CacheStats,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: state.service.cache().stats().await,
    })
}

/// Re-emits a frontend log line through tracing.
pub async fn frontend_log(Json(entry): Json<FrontendLog>) -> StatusCode {
    commands::frontend_log(&entry);
    StatusCode::NO_CONTENT
}
