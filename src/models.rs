use crate::assets::{Background, ImageSource};
use crate::html;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Page layout tag as stored and exchanged with the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PageLayout {
    #[default]
    TextOnly,
    ImageTop,
    ImageBottom,
    ImageLeft,
    ImageRight,
    FullImage,
    Cover,
}

impl PageLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageLayout::TextOnly => "text-only",
            PageLayout::ImageTop => "image-top",
            PageLayout::ImageBottom => "image-bottom",
            PageLayout::ImageLeft => "image-left",
            PageLayout::ImageRight => "image-right",
            PageLayout::FullImage => "full-image",
            PageLayout::Cover => "cover",
        }
    }

    /// Unknown tags fall back to a plain text page
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().replace('_', "-").as_str() {
            "image-top" => PageLayout::ImageTop,
            "image-bottom" => PageLayout::ImageBottom,
            "image-left" => PageLayout::ImageLeft,
            "image-right" => PageLayout::ImageRight,
            "full-image" => PageLayout::FullImage,
            "cover" => PageLayout::Cover,
            _ => PageLayout::TextOnly,
        }
    }
}

impl From<String> for PageLayout {
    fn from(tag: String) -> Self {
        PageLayout::from_tag(&tag)
    }
}

impl From<PageLayout> for String {
    fn from(layout: PageLayout) -> Self {
        layout.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Database id; `None` until the page is saved
    pub id: Option<i64>,
    pub layout: PageLayout,
    pub title: String,
    pub text: String,
    pub image: Option<ImageSource>,
    pub background: Option<Background>,
}

impl Page {
    pub fn new(layout: PageLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Visible character count of the body text
    pub fn text_len(&self) -> usize {
        html::text_len(&self.text)
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn has_title(&self) -> bool {
        html::text_len(&self.title) > 0
    }

    /// No body text and no image
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.text_len() == 0
    }

    /// No text, no title and no image
    pub fn is_blank(&self) -> bool {
        self.is_empty() && !self.has_title()
    }

    /// A fresh page continuing this one's look
    pub fn continuation(&self) -> Self {
        Self {
            layout: self.layout,
            background: self.background.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookMetadata {
    pub title: String,
    pub description: String,
    pub cover: Option<ImageSource>,
    pub authors: Vec<i64>,
    pub characters: Vec<i64>,
    pub categories: Vec<i64>,
    pub genres: Vec<i64>,
    pub tags: Vec<i64>,
    pub values: Vec<i64>,
    pub level: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    pub id: Option<i64>,
    pub owner_id: String,
    pub metadata: BookMetadata,
    pub pages: Vec<Page>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl Book {
    /// A new, unsaved book with a cover page and one text page
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            pages: vec![Page::new(PageLayout::Cover), Page::new(PageLayout::TextOnly)],
            ..Self::default()
        }
    }

    /// Whether any cover, image or background still needs uploading
    pub fn has_pending_assets(&self) -> bool {
        self.metadata.cover.as_ref().is_some_and(ImageSource::is_pending)
            || self.pages.iter().any(|p| {
                p.image.as_ref().is_some_and(ImageSource::is_pending)
                    || p
                        .background
                        .as_ref()
                        .and_then(Background::image)
                        .is_some_and(ImageSource::is_pending)
            })
    }

    /// Every remote image URL the book references
    pub fn asset_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .metadata
            .cover
            .iter()
            .chain(self.pages.iter().flat_map(|p| {
                p.image
                    .iter()
                    .chain(p.background.as_ref().and_then(Background::image))
            }))
            .filter_map(ImageSource::remote_url)
            .map(str::to_string)
            .collect();
        urls.sort();
        urls.dedup();
        urls
    }
}

/// One narrated word of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    /// Start offset into the page's plain text
    pub start: f64,
    /// End offset into the page's plain text
    pub end: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookRow {
    pub id: i64,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub cover_url: Option<String>,
    pub level_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PageRow {
    pub id: i64,
    pub book_id: i64,
    pub position: i64,
    pub layout: String,
    pub title: String,
    pub text: String,
    pub image_url: Option<String>,
    pub background: Option<String>,
}

impl From<PageRow> for Page {
    fn from(row: PageRow) -> Self {
        Page {
            id: Some(row.id),
            layout: PageLayout::from_tag(&row.layout),
            title: row.title,
            text: row.text,
            image: row.image_url.map(ImageSource::Remote),
            background: row.background.map(Background::from_stored),
        }
    }
}

/// Listing entry for the library view
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookSummary {
    pub id: i64,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub cover_url: Option<String>,
    pub level_id: Option<i64>,
    pub page_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Row of one of the catalog tables (authors, genres, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReadingProgress {
    pub user_id: String,
    pub book_id: i64,
    pub current_page: i64,
    pub last_read_time: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_tags() {
        assert_eq!(PageLayout::from_tag("image-left"), PageLayout::ImageLeft);
        assert_eq!(PageLayout::from_tag("IMAGE_TOP"), PageLayout::ImageTop);
        assert_eq!(PageLayout::from_tag("something-new"), PageLayout::TextOnly);

        let json = serde_json::to_string(&PageLayout::FullImage).unwrap();
        assert_eq!(json, "\"full-image\"");
        let parsed: PageLayout = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(parsed, PageLayout::TextOnly);
    }

    #[test]
    fn test_new_book_has_two_pages() {
        let book = Book::new("user-1");
        assert_eq!(book.pages.len(), 2);
        assert_eq!(book.pages[0].layout, PageLayout::Cover);
        assert!(!book.has_pending_assets());
    }

    #[test]
    fn test_asset_urls() {
        let mut book = Book::new("u");
        book.metadata.cover = Some(ImageSource::Remote("https://cdn/c.png".into()));
        book.pages[1].image = Some(ImageSource::Remote("https://cdn/p.png".into()));
        book.pages[1].background = Some(Background::Image(ImageSource::Remote("https://cdn/c.png".into())));
        book.pages[0].background = Some(Background::Color("#fff".into()));
        assert_eq!(book.asset_urls(), vec!["https://cdn/c.png", "https://cdn/p.png"]);
    }

    #[test]
    fn test_blank_page() {
        assert!(Page::with_text("<p></p>").is_blank());
        assert!(!Page::with_text("<p>x</p>").is_blank());
        let titled = Page {
            title: "<h1>Fin</h1>".into(),
            ..Page::default()
        };
        assert!(!titled.is_blank());
    }

    #[test]
    fn test_continuation_inherits_look() {
        let page = Page {
            layout: PageLayout::ImageLeft,
            text: "abc".into(),
            background: Some(Background::Color("#fafafa".into())),
            ..Page::default()
        };
        let next = page.continuation();
        assert_eq!(next.layout, PageLayout::ImageLeft);
        assert_eq!(next.background, page.background);
        assert!(next.text.is_empty());
        assert!(next.id.is_none());
    }
}
