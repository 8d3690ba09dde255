//! Book payload used by the create/update endpoints.
//!
//! Metadata field names are the Spanish ones existing clients send. Image
//! fields carry either a URL or a base64 `data:` URL for a new upload.

use crate::assets::{AssetError, Background, ImageSource, PendingUpload, PreviewRegistry};
use crate::models::{Book, BookMetadata, Page, PageLayout};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyPageDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub layout: PageLayout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyBookDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub titulo: String,
    #[serde(default)]
    pub descripcion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portada: Option<String>,
    #[serde(default)]
    pub autores: Vec<i64>,
    #[serde(default)]
    pub personajes: Vec<i64>,
    #[serde(default)]
    pub categorias: Vec<i64>,
    #[serde(default)]
    pub generos: Vec<i64>,
    #[serde(default)]
    pub etiquetas: Vec<i64>,
    #[serde(default)]
    pub valores: Vec<i64>,
    #[serde(default)]
    pub nivel: Option<i64>,
    #[serde(default)]
    pub pages: Vec<LegacyPageDto>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn image_source(value: &str, previews: Option<&PreviewRegistry>) -> Result<ImageSource, AssetError> {
    Ok(match ImageSource::parse(value)? {
        ImageSource::Pending(upload) => with_preview(upload, previews),
        remote => remote,
    })
}

fn background(value: &str, previews: Option<&PreviewRegistry>) -> Result<Background, AssetError> {
    Ok(match Background::parse(value)? {
        Background::Image(ImageSource::Pending(upload)) => {
            Background::Image(with_preview(upload, previews))
        }
        other => other,
    })
}

fn with_preview(upload: PendingUpload, previews: Option<&PreviewRegistry>) -> ImageSource {
    match previews {
        Some(registry) => ImageSource::Pending(upload.with_preview(registry)),
        None => ImageSource::Pending(upload),
    }
}

impl LegacyPageDto {
    pub fn into_page(self, previews: Option<&PreviewRegistry>) -> Result<Page, AssetError> {
        Ok(Page {
            id: self.id,
            layout: self.layout,
            title: self.title.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            image: non_empty(self.image)
                .map(|v| image_source(&v, previews))
                .transpose()?,
            background: non_empty(self.background)
                .map(|v| background(&v, previews))
                .transpose()?,
        })
    }

    pub fn from_page(page: &Page) -> Self {
        Self {
            id: page.id,
            layout: page.layout,
            title: (!page.title.is_empty()).then(|| page.title.clone()),
            text: (!page.text.is_empty()).then(|| page.text.clone()),
            image: page.image.as_ref().map(ImageSource::display_url),
            background: page.background.as_ref().map(Background::display_value),
        }
    }
}

impl LegacyBookDto {
    /// Builds the editor book; `data:` images become pending uploads,
    /// registered with `previews` when given.
    pub fn into_book(self, owner_id: &str, previews: Option<&PreviewRegistry>) -> Result<Book, AssetError> {
        let pages = self
            .pages
            .into_iter()
            .map(|p| p.into_page(previews))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Book {
            id: self.id,
            owner_id: owner_id.to_string(),
            metadata: BookMetadata {
                title: self.titulo,
                description: self.descripcion,
                cover: non_empty(self.portada)
                    .map(|v| image_source(&v, previews))
                    .transpose()?,
                authors: self.autores,
                characters: self.personajes,
                categories: self.categorias,
                genres: self.generos,
                tags: self.etiquetas,
                values: self.valores,
                level: self.nivel,
            },
            pages,
            created_at: None,
            updated_at: None,
        })
    }

    pub fn from_book(book: &Book) -> Self {
        let meta = &book.metadata;
        Self {
            id: book.id,
            titulo: meta.title.clone(),
            descripcion: meta.description.clone(),
            portada: meta.cover.as_ref().map(ImageSource::display_url),
            autores: meta.authors.clone(),
            personajes: meta.characters.clone(),
            categorias: meta.categories.clone(),
            generos: meta.genres.clone(),
            etiquetas: meta.tags.clone(),
            valores: meta.values.clone(),
            nivel: meta.level,
            pages: book.pages.iter().map(LegacyPageDto::from_page).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_1X1: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

    #[test]
    fn test_parse_client_payload() {
        let json = format!(
            r##"{{
                "titulo": "El gato",
                "descripcion": "Un gato curioso",
                "portada": "{}",
                "autores": [1, 2],
                "generos": [3],
                "nivel": 4,
                "pages": [
                    {{"layout": "cover", "background": "#ffcc00"}},
                    {{"layout": "image-left", "text": "<p>Hola</p>", "image": "https://cdn/x.png"}},
                    {{"layout": "mystery", "image": ""}}
                ]
            }}"##,
            PNG_1X1
        );
        let dto: LegacyBookDto = serde_json::from_str(&json).unwrap();
        let previews = PreviewRegistry::new();
        let book = dto.into_book("user-1", Some(&previews)).unwrap();

        assert_eq!(book.owner_id, "user-1");
        assert_eq!(book.metadata.title, "El gato");
        assert_eq!(book.metadata.authors, vec![1, 2]);
        assert_eq!(book.metadata.level, Some(4));
        assert!(book.metadata.cover.as_ref().unwrap().is_pending());
        assert_eq!(previews.len(), 1);

        assert_eq!(book.pages[0].background, Some(Background::Color("#ffcc00".into())));
        assert_eq!(book.pages[1].layout, PageLayout::ImageLeft);
        assert_eq!(book.pages[1].image, Some(ImageSource::Remote("https://cdn/x.png".into())));
        assert_eq!(book.pages[2].layout, PageLayout::TextOnly);
        assert_eq!(book.pages[2].image, None);
    }

    #[test]
    fn test_bad_data_url_rejected() {
        let dto = LegacyBookDto {
            portada: Some("data:image/png;base64,!!".into()),
            ..LegacyBookDto::default()
        };
        assert!(matches!(dto.into_book("u", None), Err(AssetError::Base64(_))));
    }

    #[test]
    fn test_from_book_shows_preview_urls() {
        let previews = PreviewRegistry::new();
        let mut book = Book::new("u");
        book.id = Some(9);
        book.metadata.title = "T".into();
        book.metadata.cover = Some(image_source(PNG_1X1, Some(&previews)).unwrap());
        book.pages[1].text = "hi".into();

        let dto = LegacyBookDto::from_book(&book);
        assert_eq!(dto.id, Some(9));
        assert!(dto.portada.unwrap().starts_with("preview://"));
        assert_eq!(dto.pages[1].text.as_deref(), Some("hi"));
        assert_eq!(dto.pages[0].title, None);

        let json = serde_json::to_value(LegacyBookDto::from_book(&Book::new("u"))).unwrap();
        assert_eq!(json["pages"][0]["layout"], "cover");
        assert!(json.get("portada").is_none());
    }
}
