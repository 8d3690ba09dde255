use crate::html;
use crate::models::Book;
use serde::Serialize;
use thiserror::Error;

/// A book invariant that does not hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Title cannot be empty")]
    MissingTitle,
    #[error("Description cannot be empty")]
    MissingDescription,
    #[error("A cover image is required")]
    MissingCover,
    #[error("At least one author is required")]
    NoAuthors,
    #[error("At least one category is required")]
    NoCategories,
    #[error("At least one genre is required")]
    NoGenres,
    #[error("The book has no pages")]
    NoPages,
}

/// Checks everything a book needs before it can be saved.
/// Collects every failure rather than stopping at the first.
pub fn validate_book(book: &Book) -> Result<(), Vec<ValidationError>> {
    let meta = &book.metadata;
    let mut errors = Vec::new();

    if html::plain_text(&meta.title).trim().is_empty() {
        errors.push(ValidationError::MissingTitle);
    }
    if html::plain_text(&meta.description).trim().is_empty() {
        errors.push(ValidationError::MissingDescription);
    }
    let has_cover = match &meta.cover {
        Some(source) => source.remote_url().map_or(true, |url| !url.trim().is_empty()),
        None => false,
    };
    if !has_cover {
        errors.push(ValidationError::MissingCover);
    }
    if meta.authors.is_empty() {
        errors.push(ValidationError::NoAuthors);
    }
    if meta.categories.is_empty() {
        errors.push(ValidationError::NoCategories);
    }
    if meta.genres.is_empty() {
        errors.push(ValidationError::NoGenres);
    }
    if book.pages.is_empty() {
        errors.push(ValidationError::NoPages);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{ImageSource, PendingUpload};

    fn valid_book() -> Book {
        let mut book = Book::new("user-1");
        book.metadata.title = "The Lost Kite".into();
        book.metadata.description = "A windy afternoon.".into();
        book.metadata.cover = Some(ImageSource::Remote("https://cdn/cover.png".into()));
        book.metadata.authors = vec![1];
        book.metadata.categories = vec![2];
        book.metadata.genres = vec![3];
        book
    }

    #[test]
    fn test_valid_book_passes() {
        assert_eq!(validate_book(&valid_book()), Ok(()));
    }

    #[test]
    fn test_pending_cover_counts() {
        let mut book = valid_book();
        book.metadata.cover = Some(ImageSource::Pending(PendingUpload::new(vec![1u8])));
        assert!(validate_book(&book).is_ok());
    }

    #[test]
    fn test_collects_every_failure() {
        let mut book = Book::new("user-1");
        book.metadata.title = "<p> </p>".into();
        book.pages.clear();

        let errors = validate_book(&book).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingTitle,
                ValidationError::MissingDescription,
                ValidationError::MissingCover,
                ValidationError::NoAuthors,
                ValidationError::NoCategories,
                ValidationError::NoGenres,
                ValidationError::NoPages,
            ]
        );
    }

    #[test]
    fn test_blank_cover_url_rejected() {
        let mut book = valid_book();
        book.metadata.cover = Some(ImageSource::Remote("  ".into()));
        assert_eq!(validate_book(&book), Err(vec![ValidationError::MissingCover]));
    }
}
