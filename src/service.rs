//! Book persistence on top of the data-access layer and the object store.
//!
//! Saving runs as validate, upload, write, commit. Pending uploads are put
//! into the store first, then the book row, its pages and every relation are
//! written in one transaction. When anything fails the transaction rolls back
//! and the objects created by this save are deleted again (best effort).
//! After a successful commit, objects the previous version referenced but the
//! new one does not are removed.

use crate::assets::{Background, ImageSource};
use crate::cache::BookCache;
use crate::commands::{self, Db};
use crate::error::Error;
use crate::models::{Book, BookSummary};
use crate::storage::{object_file_name, object_path, owned_by, ObjectStore};
use crate::validation::validate_book;
use futures::future::join_all;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub book_id: i64,
    pub pages: usize,
    /// Objects written by this save
    pub uploaded: usize,
    /// Objects of the previous version deleted after commit
    pub removed: usize,
}

#[derive(Clone)]
pub struct BookService {
    db: Db,
    store: Arc<dyn ObjectStore>,
    cache: BookCache,
}

struct Committed {
    book: Book,
    page_ids: Vec<i64>,
    previous_urls: Vec<String>,
}

impl BookService {
    pub fn new(db: Db, store: Arc<dyn ObjectStore>, cache: BookCache) -> Self {
        Self { db, store, cache }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn cache(&self) -> &BookCache {
        &self.cache
    }

    /// Persists `book`. On success the book carries its ids and every pending
    /// upload is replaced by its stored URL; on failure it is left untouched.
    pub async fn save(&self, book: &mut Book) -> Result<SaveReport, Error> {
        validate_book(book)?;

        let pool = self.db.lock().await;
        let mut created = Vec::new();
        let committed = match self.write(&pool, book, &mut created).await {
            Ok(committed) => committed,
            Err(e) => {
                tracing::warn!(error = %e, uploaded = created.len(), "book save failed, rolling back");
                self.remove_objects(&created).await;
                return Err(e);
            }
        };
        drop(pool);

        let Committed {
            book: mut saved,
            page_ids,
            previous_urls,
        } = committed;
        for (page, id) in saved.pages.iter_mut().zip(page_ids) {
            page.id = Some(id);
        }
        let book_id = saved.id.unwrap_or_default();

        let current: HashSet<String> = saved.asset_urls().into_iter().collect();
        let orphans: Vec<String> = previous_urls
            .into_iter()
            .filter(|url| !current.contains(url))
            .filter_map(|url| self.own_object(&url, &saved.owner_id, book_id))
            .collect();
        let removed = self.remove_objects(&orphans).await;

        self.cache.invalidate(book_id).await;
        let report = SaveReport {
            book_id,
            pages: saved.pages.len(),
            uploaded: created.len(),
            removed,
        };
        *book = saved;

        tracing::info!(book_id, pages = report.pages, uploaded = report.uploaded, "book saved");
        Ok(report)
    }

    async fn write(
        &self,
        pool: &SqlitePool,
        book: &Book,
        created: &mut Vec<String>,
    ) -> Result<Committed, Error> {
        let mut tx = pool.begin().await?;

        let previous_urls = match book.id {
            Some(id) => {
                let owner = commands::book_owner(&mut tx, id)
                    .await?
                    .ok_or(Error::BookNotFound(id))?;
                if owner != book.owner_id {
                    return Err(Error::Forbidden(id));
                }
                commands::fetch_book(&mut tx, id)
                    .await?
                    .map(|b| b.asset_urls())
                    .unwrap_or_default()
            }
            None => Vec::new(),
        };

        let mut resolved = book.clone();
        let book_id = commands::upsert_book_row(&mut tx, &resolved).await?;
        resolved.id = Some(book_id);

        if let Some(cover) = resolved.metadata.cover.as_mut() {
            self.upload(&book.owner_id, book_id, "cover", cover, created).await?;
        }
        for page in resolved.pages.iter_mut() {
            if let Some(image) = page.image.as_mut() {
                self.upload(&book.owner_id, book_id, "page", image, created).await?;
            }
            if let Some(Background::Image(image)) = page.background.as_mut() {
                self.upload(&book.owner_id, book_id, "background", image, created).await?;
            }
        }

        commands::upsert_book_row(&mut tx, &resolved).await?;
        let page_ids = commands::write_pages(&mut tx, book_id, &resolved.pages).await?;
        commands::write_relations(&mut tx, book_id, &resolved.metadata).await?;
        tx.commit().await?;

        Ok(Committed {
            book: resolved,
            page_ids,
            previous_urls,
        })
    }

    /// Replaces a pending source with the URL of its stored object
    async fn upload(
        &self,
        owner_id: &str,
        book_id: i64,
        kind: &str,
        source: &mut ImageSource,
        created: &mut Vec<String>,
    ) -> Result<(), Error> {
        let ImageSource::Pending(upload) = source else {
            return Ok(());
        };
        let name = object_file_name(kind, &upload.bytes)?;
        let path = object_path(owner_id, book_id, &name);
        let stored = self.store.put(&path, &upload.bytes).await?;
        if stored.created {
            created.push(stored.path);
        }
        *source = ImageSource::Remote(stored.url);
        Ok(())
    }

    /// Deletes objects concurrently, logging failures; returns how many went
    async fn remove_objects(&self, paths: &[String]) -> usize {
        let results = join_all(paths.iter().map(|path| self.store.delete(path))).await;
        let mut removed = 0;
        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(path = %path, error = %e, "failed to remove stored object"),
            }
        }
        removed
    }

    /// Loads a book through the cache
    pub async fn load(&self, id: i64) -> Result<Arc<Book>, Error> {
        if let Some(book) = self.cache.get(id).await {
            return Ok(book);
        }

        let pool = self.db.lock().await;
        let mut conn = pool.acquire().await?;
        let book = commands::fetch_book(&mut conn, id)
            .await?
            .ok_or(Error::BookNotFound(id))?;
        let book = Arc::new(book);
        self.cache.put(book.clone()).await;
        Ok(book)
    }

    pub async fn list(&self, owner: Option<&str>) -> Result<Vec<BookSummary>, Error> {
        let pool = self.db.lock().await;
        let mut conn = pool.acquire().await?;
        commands::list_books(&mut conn, owner).await
    }

    /// Store path behind `url` when the object belongs to this book. Books
    /// may reference anyone's media; only their own objects are ever removed.
    fn own_object(&self, url: &str, owner: &str, book_id: i64) -> Option<String> {
        self.store
            .path_for_url(url)
            .filter(|path| owned_by(path, owner, book_id))
    }

    /// Deletes a book owned by `user_id` and its stored images
    pub async fn delete(&self, id: i64, user_id: &str) -> Result<usize, Error> {
        let urls = {
            let pool = self.db.lock().await;
            let mut conn = pool.acquire().await?;
            let owner = commands::book_owner(&mut conn, id)
                .await?
                .ok_or(Error::BookNotFound(id))?;
            if owner != user_id {
                return Err(Error::Forbidden(id));
            }
            commands::delete_book(&mut conn, id).await?
        };
        self.cache.invalidate(id).await;

        let paths: Vec<String> = urls
            .iter()
            .filter_map(|url| self.own_object(url, user_id, id))
            .collect();
        let removed = self.remove_objects(&paths).await;
        tracing::info!(book_id = id, removed, "book deleted");
        Ok(removed)
    }
}
