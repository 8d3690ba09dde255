pub mod book;
pub mod catalog;
pub mod log;
pub mod progress;

pub use book::*;
pub use catalog::*;
pub use log::*;
pub use progress::*;

use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared database handle; saves hold the lock for their whole transaction
pub type Db = Arc<Mutex<SqlitePool>>;

#[cfg(test)]
pub(crate) async fn memory_db() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_database(&pool).await.unwrap();
    pool
}
