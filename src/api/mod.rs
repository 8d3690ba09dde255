//! REST API for the storybook server.
//!
//! Provides HTTP endpoints for:
//! - Book create/read/update/delete using the legacy payload
//! - Catalog tables (authors, genres, ...)
//! - Reflow of a page list
//! - Reading progress
//! - Frontend logging
//! - Uploaded media under `/media`

pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::reflow::ReflowOptions;
use crate::service::BookService;

/// Header carrying the calling user's id
pub const USER_HEADER: &str = "x-user-id";

/// Request bodies carry base64 images
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Shared state for API handlers.
pub struct ApiState {
    pub service: BookService,

    /// Reflow settings applied when a request does not override them.
    pub reflow: ReflowOptions,

    /// Directory served under `/media`.
    pub media_dir: PathBuf,
}

impl ApiState {
    pub fn new(service: BookService, reflow: ReflowOptions, media_dir: PathBuf) -> Self {
        Self {
            service,
            reflow,
            media_dir,
        }
    }
}

/// Calling user from the `x-user-id` header
pub fn user_id(headers: &HeaderMap) -> Result<String, Error> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(Error::Unauthorized)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    messages: Vec<String>,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::BookNotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Asset(_) | Error::Editor(_) | Error::Message(_) => StatusCode::BAD_REQUEST,
            Error::Storage(crate::storage::StorageError::UnsupportedImage) => StatusCode::BAD_REQUEST,
            Error::Storage(_) | Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let messages = match &self {
            Error::Validation(errors) => errors.iter().map(ToString::to_string).collect(),
            _ => Vec::new(),
        };
        let body = ErrorBody {
            error: self.to_string(),
            messages,
        };
        (status, Json(body)).into_response()
    }
}

/// Build the API router with all routes.
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let media = ServeDir::new(&state.media_dir);

    Router::new()
        .route("/api/v1/status", get(handlers::status::health))
        .route("/api/v1/log", post(handlers::status::frontend_log))
        // Books
        .route(
            "/api/v1/books",
            get(handlers::books::list_books).post(handlers::books::create_book),
        )
        .route(
            "/api/v1/books/:id",
            get(handlers::books::get_book)
                .put(handlers::books::update_book)
                .delete(handlers::books::delete_book),
        )
        .route(
            "/api/v1/books/:id/progress",
            get(handlers::reading::get_progress).put(handlers::reading::update_progress),
        )
        .route("/api/v1/reflow", post(handlers::reading::reflow_pages))
        // Catalogs
        .route(
            "/api/v1/catalog/:kind",
            get(handlers::catalog::list_entries).post(handlers::catalog::add_entry),
        )
        .nest_service("/media", media)
        // Middleware
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(())
                .on_response(|response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                    let status = response.status();
                    if !status.is_success() {
                        tracing::warn!(
                            status = %status,
                            latency_ms = latency.as_millis(),
                            "request failed"
                        );
                    }
                }),
        )
        .with_state(state)
}

/// Start the API server.
pub async fn serve(state: Arc<ApiState>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    tracing::info!("Storybook API listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
