//! Reflow and reading progress handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{user_id, ApiState};
use crate::commands;
use crate::dto::LegacyPageDto;
use crate::error::Error;
use crate::models::ReadingProgress;
use crate::reflow::{self, ReflowReport, MIN_PULL_CHARS};

/// Most pages one reflow request may carry
pub const MAX_REFLOW_PAGES: usize = 500;
/// Most page HTML, in bytes, one reflow request may carry
pub const MAX_REFLOW_TEXT_BYTES: usize = 512 * 1024;

#[derive(Deserialize)]
pub struct ReflowRequest {
    pub pages: Vec<LegacyPageDto>,
    #[serde(default)]
    pub edited_page: usize,
    pub max_chars: Option<usize>,
    pub protect_cover: Option<bool>,
}

#[derive(Serialize)]
pub struct ReflowResponse {
    pub pages: Vec<LegacyPageDto>,
    pub report: ReflowReport,
}

/// Repaginates a page list without touching any stored book.
pub async fn reflow_pages(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ReflowRequest>,
) -> Result<Json<ReflowResponse>, Error> {
    if request.pages.len() > MAX_REFLOW_PAGES {
        return Err(Error::Message(format!(
            "Too many pages to reflow (limit {MAX_REFLOW_PAGES})"
        )));
    }
    let text_bytes: usize = request
        .pages
        .iter()
        .flat_map(|p| [p.title.as_deref(), p.text.as_deref()])
        .map(|html| html.map_or(0, str::len))
        .sum();
    if text_bytes > MAX_REFLOW_TEXT_BYTES {
        return Err(Error::Message(format!(
            "Page text too large to reflow (limit {MAX_REFLOW_TEXT_BYTES} bytes)"
        )));
    }

    let mut options = state.reflow;
    if let Some(max_chars) = request.max_chars {
        options = options.with_max_chars(max_chars.max(MIN_PULL_CHARS));
    }
    if let Some(protect_cover) = request.protect_cover {
        options.protect_cover = protect_cover;
    }

    let mut pages = request
        .pages
        .into_iter()
        .map(|p| p.into_page(None))
        .collect::<Result<Vec<_>, _>>()?;
    let report = reflow::reflow(&mut pages, request.edited_page, &options);

    Ok(Json(ReflowResponse {
        pages: pages.iter().map(LegacyPageDto::from_page).collect(),
        report,
    }))
}

#[derive(Deserialize)]
pub struct ProgressUpdate {
    pub current_page: i64,
}

pub async fn get_progress(
    State(state): State<Arc<ApiState>>,
    Path(book_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Option<ReadingProgress>>, Error> {
    let user = user_id(&headers)?;
    let pool = state.service.db().lock().await;
    Ok(Json(commands::get_progress(&pool, &user, book_id).await?))
}

pub async fn update_progress(
    State(state): State<Arc<ApiState>>,
    Path(book_id): Path<i64>,
    headers: HeaderMap,
    Json(update): Json<ProgressUpdate>,
) -> Result<Json<ReadingProgress>, Error> {
    let user = user_id(&headers)?;
    let pool = state.service.db().lock().await;
    Ok(Json(
        commands::update_progress(&pool, &user, book_id, update.current_page).await?,
    ))
}
