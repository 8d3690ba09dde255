//! Book handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use crate::api::{user_id, ApiState};
use crate::dto::LegacyBookDto;
use crate::error::Error;
use crate::models::BookSummary;
use crate::service::SaveReport;

/// Response to a create or update.
#[derive(Serialize)]
pub struct SaveResponse {
    pub report: SaveReport,
    pub book: LegacyBookDto,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub removed_files: usize,
}

/// Lists the caller's books, or every book without a user header.
pub async fn list_books(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookSummary>>, Error> {
    let owner = user_id(&headers).ok();
    let books = state.service.list(owner.as_deref()).await?;
    Ok(Json(books))
}

pub async fn get_book(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<LegacyBookDto>, Error> {
    let book = state.service.load(id).await?;
    Ok(Json(LegacyBookDto::from_book(&book)))
}

pub async fn create_book(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(mut dto): Json<LegacyBookDto>,
) -> Result<(StatusCode, Json<SaveResponse>), Error> {
    let owner = user_id(&headers)?;
    dto.id = None;
    let response = save(&state, dto, &owner).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_book(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(mut dto): Json<LegacyBookDto>,
) -> Result<Json<SaveResponse>, Error> {
    let owner = user_id(&headers)?;
    dto.id = Some(id);
    Ok(Json(save(&state, dto, &owner).await?))
}

async fn save(state: &ApiState, dto: LegacyBookDto, owner: &str) -> Result<SaveResponse, Error> {
    let mut book = dto.into_book(owner, None)?;
    let report = state.service.save(&mut book).await?;
    Ok(SaveResponse {
        report,
        book: LegacyBookDto::from_book(&book),
    })
}

pub async fn delete_book(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>, Error> {
    let owner = user_id(&headers)?;
    let removed_files = state.service.delete(id, &owner).await?;
    Ok(Json(DeleteResponse { removed_files }))
}
