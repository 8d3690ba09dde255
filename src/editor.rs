//! In-memory editing session over one book.

use crate::assets::{Background, ImageSource, PendingUpload, PreviewRegistry};
use crate::models::{Book, BookMetadata, Page, PageLayout};
use crate::reflow::{self, ReflowOptions, ReflowReport, MIN_PAGES};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("Page {0} does not exist")]
    PageOutOfRange(usize),
    #[error("The cover page only accepts background changes")]
    CoverLocked,
    #[error("A book needs at least {} pages", MIN_PAGES)]
    MinimumPages,
}

pub struct BookEditor {
    book: Book,
    options: ReflowOptions,
    previews: PreviewRegistry,
}

impl BookEditor {
    pub fn new(book: Book, options: ReflowOptions, previews: PreviewRegistry) -> Self {
        Self {
            book,
            options,
            previews,
        }
    }

    /// Starts a fresh book for `owner_id`
    pub fn create(owner_id: &str, options: ReflowOptions, previews: PreviewRegistry) -> Self {
        Self::new(Book::new(owner_id), options, previews)
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn into_book(self) -> Book {
        self.book
    }

    pub fn pages(&self) -> &[Page] {
        &self.book.pages
    }

    pub fn metadata_mut(&mut self) -> &mut BookMetadata {
        &mut self.book.metadata
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    fn page_mut(&mut self, index: usize) -> Result<&mut Page, EditorError> {
        self.book
            .pages
            .get_mut(index)
            .ok_or(EditorError::PageOutOfRange(index))
    }

    /// Page `index` for a content change; the protected cover refuses
    fn content_page_mut(&mut self, index: usize) -> Result<&mut Page, EditorError> {
        if index == 0 && self.options.protect_cover && !self.book.pages.is_empty() {
            return Err(EditorError::CoverLocked);
        }
        self.page_mut(index)
    }

    /// Inserts a page after `after` (or at the end) and returns its index
    pub fn add_page(&mut self, after: Option<usize>, layout: PageLayout) -> Result<usize, EditorError> {
        let index = match after {
            Some(i) if i >= self.book.pages.len() => return Err(EditorError::PageOutOfRange(i)),
            Some(i) => i + 1,
            None => self.book.pages.len(),
        };
        self.book.pages.insert(index, Page::new(layout));
        Ok(index)
    }

    pub fn delete_page(&mut self, index: usize) -> Result<Page, EditorError> {
        if index >= self.book.pages.len() {
            return Err(EditorError::PageOutOfRange(index));
        }
        if index == 0 && self.options.protect_cover {
            return Err(EditorError::CoverLocked);
        }
        if self.book.pages.len() <= MIN_PAGES {
            return Err(EditorError::MinimumPages);
        }
        Ok(self.book.pages.remove(index))
    }

    pub fn set_layout(&mut self, index: usize, layout: PageLayout) -> Result<(), EditorError> {
        self.content_page_mut(index)?.layout = layout;
        Ok(())
    }

    pub fn set_title(&mut self, index: usize, title: impl Into<String>) -> Result<(), EditorError> {
        self.content_page_mut(index)?.title = title.into();
        Ok(())
    }

    /// Replaces the page text and reflows the book from that page
    pub fn set_text(&mut self, index: usize, text: impl Into<String>) -> Result<ReflowReport, EditorError> {
        self.content_page_mut(index)?.text = text.into();
        Ok(self.reflow_from(index))
    }

    pub fn reflow_from(&mut self, index: usize) -> ReflowReport {
        reflow::reflow(&mut self.book.pages, index, &self.options)
    }

    /// Attaches freshly picked image bytes and returns the preview URL
    pub fn set_image(
        &mut self,
        index: usize,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String, EditorError> {
        let upload = self.pending(bytes, content_type);
        let url = upload.preview_url().unwrap_or_default().to_string();
        self.content_page_mut(index)?.image = Some(ImageSource::Pending(upload));
        Ok(url)
    }

    pub fn set_image_source(&mut self, index: usize, source: ImageSource) -> Result<(), EditorError> {
        self.content_page_mut(index)?.image = Some(source);
        Ok(())
    }

    pub fn clear_image(&mut self, index: usize) -> Result<(), EditorError> {
        self.content_page_mut(index)?.image = None;
        Ok(())
    }

    /// Allowed on every page, the cover included
    pub fn set_background(&mut self, index: usize, background: Option<Background>) -> Result<(), EditorError> {
        self.page_mut(index)?.background = background;
        Ok(())
    }

    pub fn set_background_image(
        &mut self,
        index: usize,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String, EditorError> {
        let upload = self.pending(bytes, content_type);
        let url = upload.preview_url().unwrap_or_default().to_string();
        self.page_mut(index)?.background = Some(Background::Image(ImageSource::Pending(upload)));
        Ok(url)
    }

    /// Sets the book cover from picked bytes and returns the preview URL
    pub fn set_cover(&mut self, bytes: Vec<u8>, content_type: Option<String>) -> String {
        let upload = self.pending(bytes, content_type);
        let url = upload.preview_url().unwrap_or_default().to_string();
        self.book.metadata.cover = Some(ImageSource::Pending(upload));
        url
    }

    fn pending(&self, bytes: Vec<u8>, content_type: Option<String>) -> PendingUpload {
        let mut upload = PendingUpload::new(bytes);
        upload.content_type = content_type;
        upload.with_preview(&self.previews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> BookEditor {
        BookEditor::create("user-1", ReflowOptions::default(), PreviewRegistry::new())
    }

    #[test]
    fn test_add_and_delete_pages() {
        let mut ed = editor();
        assert_eq!(ed.add_page(None, PageLayout::ImageTop).unwrap(), 2);
        assert_eq!(ed.add_page(Some(0), PageLayout::TextOnly).unwrap(), 1);
        assert_eq!(ed.pages().len(), 4);
        assert_eq!(ed.pages()[3].layout, PageLayout::ImageTop);
        assert_eq!(ed.add_page(Some(9), PageLayout::TextOnly), Err(EditorError::PageOutOfRange(9)));

        ed.delete_page(3).unwrap();
        ed.delete_page(2).unwrap();
        assert_eq!(ed.delete_page(1), Err(EditorError::MinimumPages));
        assert_eq!(ed.delete_page(0), Err(EditorError::CoverLocked));
        assert_eq!(ed.delete_page(5), Err(EditorError::PageOutOfRange(5)));
    }

    #[test]
    fn test_cover_only_takes_background() {
        let mut ed = editor();
        assert_eq!(ed.set_text(0, "hello"), Err(EditorError::CoverLocked));
        assert_eq!(ed.set_layout(0, PageLayout::FullImage), Err(EditorError::CoverLocked));
        assert_eq!(ed.set_image(0, vec![1], None), Err(EditorError::CoverLocked));

        ed.set_background(0, Some(Background::Color("#ffeedd".into()))).unwrap();
        assert_eq!(ed.pages()[0].background, Some(Background::Color("#ffeedd".into())));
    }

    #[test]
    fn test_set_text_reflows() {
        let mut ed = editor();
        let report = ed.set_text(1, "word ".repeat(300)).unwrap();
        assert!(report.changed);
        assert_eq!(ed.pages().len(), 4);
        assert!(ed.pages().iter().all(|p| p.text_len() <= 650));
    }

    #[test]
    fn test_image_preview_lifecycle() {
        let mut ed = editor();
        let url = ed.set_image(1, vec![1, 2, 3], Some("image/png".into())).unwrap();
        assert_eq!(ed.previews().resolve(&url).as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(ed.book().has_pending_assets());

        // Replacing the image releases the old preview
        let second = ed.set_image(1, vec![4], None).unwrap();
        assert!(ed.previews().resolve(&url).is_none());
        assert_eq!(ed.previews().len(), 1);

        ed.clear_image(1).unwrap();
        assert!(ed.previews().resolve(&second).is_none());
        assert!(!ed.book().has_pending_assets());
    }

    #[test]
    fn test_cover_and_metadata() {
        let mut ed = editor();
        let url = ed.set_cover(vec![7], None);
        assert!(ed.previews().resolve(&url).is_some());
        ed.metadata_mut().title = "Moon".into();
        ed.metadata_mut().authors.push(3);

        let registry = ed.previews().clone();
        let book = ed.into_book();
        assert_eq!(book.metadata.title, "Moon");
        drop(book);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unprotected_cover_is_editable() {
        let options = ReflowOptions {
            protect_cover: false,
            ..ReflowOptions::default()
        };
        let mut ed = BookEditor::create("u", options, PreviewRegistry::new());
        ed.set_title(0, "Once").unwrap();
        assert_eq!(ed.pages()[0].title, "Once");
    }
}
