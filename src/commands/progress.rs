use crate::error::Error;
use crate::models::ReadingProgress;
use sqlx::SqlitePool;

pub async fn get_progress(
    pool: &SqlitePool,
    user_id: &str,
    book_id: i64,
) -> Result<Option<ReadingProgress>, Error> {
    let progress = sqlx::query_as::<_, ReadingProgress>(
        "SELECT user_id, book_id, current_page, last_read_time
         FROM reading_progress WHERE user_id = ? AND book_id = ?",
    )
    .bind(user_id)
    .bind(book_id)
    .fetch_optional(pool)
    .await?;

    Ok(progress)
}

/// Records the page a reader is on, clamped into the book
pub async fn update_progress(
    pool: &SqlitePool,
    user_id: &str,
    book_id: i64,
    current_page: i64,
) -> Result<ReadingProgress, Error> {
    let page_count: Option<i64> = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM pages WHERE book_id = b.id) FROM books b WHERE b.id = ?",
    )
    .bind(book_id)
    .fetch_optional(pool)
    .await?;
    let Some(page_count) = page_count else {
        return Err(Error::BookNotFound(book_id));
    };

    let page = current_page.clamp(0, (page_count - 1).max(0));
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO reading_progress (user_id, book_id, current_page, last_read_time)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(user_id, book_id) DO UPDATE SET
            current_page = excluded.current_page,
            last_read_time = excluded.last_read_time",
    )
    .bind(user_id)
    .bind(book_id)
    .bind(page)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(ReadingProgress {
        user_id: user_id.to_string(),
        book_id,
        current_page: page,
        last_read_time: Some(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{memory_db, upsert_book_row, write_pages};
    use crate::models::Book;

    #[tokio::test]
    async fn test_progress_is_clamped_and_upserted() {
        let pool = memory_db().await;
        let mut book = Book::new("author");
        book.metadata.title = "T".into();
        let book_id = {
            let mut conn = pool.acquire().await.unwrap();
            let id = upsert_book_row(&mut conn, &book).await.unwrap();
            write_pages(&mut conn, id, &book.pages).await.unwrap();
            id
        };

        assert!(get_progress(&pool, "reader", book_id).await.unwrap().is_none());

        let p = update_progress(&pool, "reader", book_id, 10).await.unwrap();
        assert_eq!(p.current_page, 1);
        let p = update_progress(&pool, "reader", book_id, -4).await.unwrap();
        assert_eq!(p.current_page, 0);

        let stored = get_progress(&pool, "reader", book_id).await.unwrap().unwrap();
        assert_eq!(stored.current_page, 0);
        assert!(stored.last_read_time.is_some());
    }

    #[tokio::test]
    async fn test_progress_for_missing_book() {
        let pool = memory_db().await;
        assert!(matches!(
            update_progress(&pool, "reader", 5, 0).await,
            Err(Error::BookNotFound(5))
        ));
    }
}
