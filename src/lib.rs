pub mod api;
pub mod assets;
pub mod cache;
pub mod commands;
pub mod config;
pub mod dto;
pub mod editor;
pub mod error;
pub mod html;
pub mod models;
pub mod narration;
pub mod navigation;
pub mod reflow;
pub mod service;
pub mod storage;
pub mod validation;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::ApiState;
use crate::cache::BookCache;
use crate::config::AppConfig;
use crate::service::BookService;
use crate::storage::LocalObjectStore;

pub use crate::error::{Error, Result};

/// Opens (creating if needed) the database and brings the schema up to date
pub async fn connect(config: &AppConfig) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(&config.database_url())?
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    commands::init_database(&pool).await?;
    Ok(pool)
}

/// Starts the HTTP server and runs until it stops
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.data_dir).await?;
    let media_dir = config.media_dir();
    tokio::fs::create_dir_all(&media_dir).await?;

    let pool = connect(&config).await?;
    tracing::info!(database = %config.database_url(), "database ready");

    let store = LocalObjectStore::new(&media_dir, config.public_url.clone());
    let service = BookService::new(Arc::new(Mutex::new(pool)), Arc::new(store), BookCache::new());
    let state = Arc::new(ApiState::new(service, config.reflow_options(), media_dir));

    api::serve(state, &config.bind).await
}
