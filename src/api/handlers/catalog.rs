//! Catalog handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::api::ApiState;
use crate::commands::{self, CatalogKind};
use crate::error::Error;
use crate::models::CatalogEntry;

#[derive(Deserialize)]
pub struct NewEntry {
    pub name: String,
}

pub async fn list_entries(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<CatalogEntry>>, Error> {
    let kind: CatalogKind = kind.parse()?;
    let pool = state.service.db().lock().await;
    Ok(Json(commands::list_catalog(&pool, kind).await?))
}

pub async fn add_entry(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
    Json(entry): Json<NewEntry>,
) -> Result<Json<CatalogEntry>, Error> {
    let kind: CatalogKind = kind.parse()?;
    let pool = state.service.db().lock().await;
    Ok(Json(commands::add_catalog_entry(&pool, kind, &entry.name).await?))
}
