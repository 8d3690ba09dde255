use crate::assets::{Background, ImageSource};
use crate::commands::catalog::CatalogKind;
use crate::error::Error;
use crate::models::{Book, BookMetadata, BookRow, BookSummary, Page, PageRow};
use sqlx::{SqliteConnection, SqlitePool};

pub async fn init_database(pool: &SqlitePool) -> Result<(), Error> {
    // Catalogs first: books and junctions reference them
    for kind in CatalogKind::ALL {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at INTEGER DEFAULT (strftime('%s', 'now'))
            )",
            kind.table()
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            cover_url TEXT,
            level_id INTEGER,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (level_id) REFERENCES levels(id) ON DELETE SET NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            layout TEXT NOT NULL DEFAULT 'text-only',
            title TEXT NOT NULL DEFAULT '',
            text TEXT NOT NULL DEFAULT '',
            image_url TEXT,
            background TEXT,
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )",
    )
    .execute(pool)
    .await?;

    for kind in CatalogKind::LINKED {
        let Some(junction) = kind.junction() else {
            continue;
        };
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {junction} (
                book_id INTEGER NOT NULL,
                {column} INTEGER NOT NULL,
                PRIMARY KEY (book_id, {column}),
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE,
                FOREIGN KEY ({column}) REFERENCES {table}(id) ON DELETE CASCADE
            )",
            junction = junction,
            column = kind.column(),
            table = kind.table(),
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS reading_progress (
            user_id TEXT NOT NULL,
            book_id INTEGER NOT NULL,
            current_page INTEGER NOT NULL DEFAULT 0,
            last_read_time INTEGER,
            PRIMARY KEY (user_id, book_id),
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )",
    )
    .execute(pool)
    .await?;

    // Indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_owner ON books(owner_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_updated_at ON books(updated_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_book_pos ON pages(book_id, position)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_progress_book ON reading_progress(book_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn book_owner(conn: &mut SqliteConnection, id: i64) -> Result<Option<String>, Error> {
    let owner = sqlx::query_scalar("SELECT owner_id FROM books WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(owner)
}

/// Inserts or updates the `books` row and returns its id.
/// The cover must already be uploaded.
pub async fn upsert_book_row(conn: &mut SqliteConnection, book: &Book) -> Result<i64, Error> {
    let meta = &book.metadata;
    let cover_url = meta.cover.as_ref().and_then(ImageSource::remote_url);
    let now = chrono::Utc::now().timestamp();

    match book.id {
        Some(id) => {
            let result = sqlx::query(
                "UPDATE books SET title = ?, description = ?, cover_url = ?, level_id = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&meta.title)
            .bind(&meta.description)
            .bind(cover_url)
            .bind(meta.level)
            .bind(now)
            .bind(id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(Error::BookNotFound(id));
            }
            Ok(id)
        }
        None => {
            let result = sqlx::query(
                "INSERT INTO books (owner_id, title, description, cover_url, level_id, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&book.owner_id)
            .bind(&meta.title)
            .bind(&meta.description)
            .bind(cover_url)
            .bind(meta.level)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            Ok(result.last_insert_rowid())
        }
    }
}

/// Writes pages in order and drops the book's pages that are no longer
/// present. Returns the page ids in page order.
pub async fn write_pages(
    conn: &mut SqliteConnection,
    book_id: i64,
    pages: &[Page],
) -> Result<Vec<i64>, Error> {
    let mut ids = Vec::with_capacity(pages.len());

    for (position, page) in pages.iter().enumerate() {
        let image_url = page.image.as_ref().and_then(ImageSource::remote_url);
        let background = page.background.as_ref().and_then(Background::stored_value);

        let updated = match page.id {
            Some(id) => {
                let result = sqlx::query(
                    "UPDATE pages SET position = ?, layout = ?, title = ?, text = ?, image_url = ?, background = ?
                     WHERE id = ? AND book_id = ?",
                )
                .bind(position as i64)
                .bind(page.layout.as_str())
                .bind(&page.title)
                .bind(&page.text)
                .bind(image_url)
                .bind(&background)
                .bind(id)
                .bind(book_id)
                .execute(&mut *conn)
                .await?;
                (result.rows_affected() > 0).then_some(id)
            }
            None => None,
        };

        let id = match updated {
            Some(id) => id,
            None => sqlx::query(
                "INSERT INTO pages (book_id, position, layout, title, text, image_url, background)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(book_id)
            .bind(position as i64)
            .bind(page.layout.as_str())
            .bind(&page.title)
            .bind(&page.text)
            .bind(image_url)
            .bind(&background)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid(),
        };
        ids.push(id);
    }

    let stored: Vec<i64> = sqlx::query_scalar("SELECT id FROM pages WHERE book_id = ?")
        .bind(book_id)
        .fetch_all(&mut *conn)
        .await?;
    for stale in stored.into_iter().filter(|id| !ids.contains(id)) {
        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(stale)
            .execute(&mut *conn)
            .await?;
    }

    Ok(ids)
}

fn linked_ids(meta: &BookMetadata, kind: CatalogKind) -> &[i64] {
    match kind {
        CatalogKind::Authors => &meta.authors,
        CatalogKind::Characters => &meta.characters,
        CatalogKind::Categories => &meta.categories,
        CatalogKind::Genres => &meta.genres,
        CatalogKind::Tags => &meta.tags,
        CatalogKind::Values => &meta.values,
        CatalogKind::Levels => &[],
    }
}

fn linked_ids_mut(meta: &mut BookMetadata, kind: CatalogKind) -> Option<&mut Vec<i64>> {
    match kind {
        CatalogKind::Authors => Some(&mut meta.authors),
        CatalogKind::Characters => Some(&mut meta.characters),
        CatalogKind::Categories => Some(&mut meta.categories),
        CatalogKind::Genres => Some(&mut meta.genres),
        CatalogKind::Tags => Some(&mut meta.tags),
        CatalogKind::Values => Some(&mut meta.values),
        CatalogKind::Levels => None,
    }
}

/// Replaces every junction row of the book. Unknown catalog ids fail the
/// foreign key check.
pub async fn write_relations(
    conn: &mut SqliteConnection,
    book_id: i64,
    meta: &BookMetadata,
) -> Result<(), Error> {
    for kind in CatalogKind::LINKED {
        let Some(junction) = kind.junction() else {
            continue;
        };
        sqlx::query(&format!("DELETE FROM {} WHERE book_id = ?", junction))
            .bind(book_id)
            .execute(&mut *conn)
            .await?;

        let insert = format!(
            "INSERT OR IGNORE INTO {} (book_id, {}) VALUES (?, ?)",
            junction,
            kind.column()
        );
        for id in linked_ids(meta, kind) {
            sqlx::query(&insert)
                .bind(book_id)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

async fn fetch_relations(
    conn: &mut SqliteConnection,
    book_id: i64,
    kind: CatalogKind,
) -> Result<Vec<i64>, Error> {
    let Some(junction) = kind.junction() else {
        return Ok(Vec::new());
    };
    let ids = sqlx::query_scalar(&format!(
        "SELECT {} FROM {} WHERE book_id = ? ORDER BY rowid",
        kind.column(),
        junction
    ))
    .bind(book_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

pub async fn fetch_book(conn: &mut SqliteConnection, id: i64) -> Result<Option<Book>, Error> {
    let row = sqlx::query_as::<_, BookRow>(
        "SELECT id, owner_id, title, description, cover_url, level_id, created_at, updated_at
         FROM books WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let pages = sqlx::query_as::<_, PageRow>(
        "SELECT id, book_id, position, layout, title, text, image_url, background
         FROM pages WHERE book_id = ? ORDER BY position, id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let mut metadata = BookMetadata {
        title: row.title,
        description: row.description,
        cover: row.cover_url.map(ImageSource::Remote),
        level: row.level_id,
        ..BookMetadata::default()
    };
    for kind in CatalogKind::LINKED {
        let ids = fetch_relations(conn, id, kind).await?;
        if let Some(slot) = linked_ids_mut(&mut metadata, kind) {
            *slot = ids;
        }
    }

    Ok(Some(Book {
        id: Some(row.id),
        owner_id: row.owner_id,
        metadata,
        pages: pages.into_iter().map(Page::from).collect(),
        created_at: Some(row.created_at),
        updated_at: Some(row.updated_at),
    }))
}

/// Library listing, newest first; `owner` narrows it to one user's books
pub async fn list_books(
    conn: &mut SqliteConnection,
    owner: Option<&str>,
) -> Result<Vec<BookSummary>, Error> {
    let books = sqlx::query_as::<_, BookSummary>(
        "SELECT b.id, b.owner_id, b.title, b.description, b.cover_url, b.level_id,
                (SELECT COUNT(*) FROM pages p WHERE p.book_id = b.id) AS page_count,
                b.created_at, b.updated_at
         FROM books b
         WHERE ? IS NULL OR b.owner_id = ?
         ORDER BY b.updated_at DESC, b.id DESC",
    )
    .bind(owner)
    .bind(owner)
    .fetch_all(&mut *conn)
    .await?;

    Ok(books)
}

/// Deletes the book with its pages, relations and progress.
/// Returns the image URLs it referenced so the caller can remove the files.
pub async fn delete_book(conn: &mut SqliteConnection, id: i64) -> Result<Vec<String>, Error> {
    let Some(book) = fetch_book(conn, id).await? else {
        return Err(Error::BookNotFound(id));
    };

    sqlx::query("DELETE FROM books WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(book.asset_urls())
}
