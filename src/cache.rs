use crate::models::Book;
use moka::future::Cache as MokaCache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MAX_PAGES: u64 = 20_000; // weighed by page count
const DEFAULT_TIME_TO_IDLE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub weighted_size: u64,
}

/// Read-through cache of loaded books for the reader
#[derive(Clone)]
pub struct BookCache {
    cache: MokaCache<i64, Arc<Book>>,
}

impl BookCache {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_PAGES, DEFAULT_TIME_TO_IDLE)
    }

    pub fn with_limits(max_pages: u64, time_to_idle: Duration) -> Self {
        let cache = MokaCache::builder()
            .weigher(|_id: &i64, book: &Arc<Book>| book.pages.len().max(1) as u32)
            .max_capacity(max_pages)
            .time_to_idle(time_to_idle)
            .build();
        Self { cache }
    }

    pub async fn get(&self, id: i64) -> Option<Arc<Book>> {
        self.cache.get(&id).await
    }

    pub async fn put(&self, book: Arc<Book>) {
        if let Some(id) = book.id {
            self.cache.insert(id, book).await;
        }
    }

    pub async fn invalidate(&self, id: i64) {
        self.cache.invalidate(&id).await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;
        CacheStats {
            entry_count: self.cache.entry_count(),
            weighted_size: self.cache.weighted_size(),
        }
    }
}

impl Default for BookCache {
    fn default() -> Self {
        Self::new()
    }
}
