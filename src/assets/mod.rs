//! Page and cover images
//! Remote URLs, pending uploads decoded from data URLs, and preview handles

use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;

/// Scheme used for in-editor preview URLs
pub const PREVIEW_SCHEME: &str = "preview://";

static COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(#[0-9a-f]{3,8}|(rgb|rgba|hsl|hsla)\([^)]*\)|transparent)\s*$")
        .expect("valid color regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("Invalid data URL format")]
    InvalidDataUrl,
    #[error("Base64 decode error: {0}")]
    Base64(String),
    #[error("Empty image data")]
    Empty,
}

/// Whether the string is a `data:` URL
pub fn is_data_url(value: &str) -> bool {
    value.starts_with("data:")
}

/// Whether the string is a CSS color usable as a page background
pub fn is_color(value: &str) -> bool {
    COLOR_RE.is_match(value)
}

/// Decodes a base64 `data:` URL into its media type and bytes
pub fn decode_data_url(value: &str) -> Result<(Option<String>, Vec<u8>), AssetError> {
    let rest = value.strip_prefix("data:").ok_or(AssetError::InvalidDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(AssetError::InvalidDataUrl)?;
    let Some(media_type) = header.strip_suffix(";base64") else {
        return Err(AssetError::InvalidDataUrl);
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AssetError::Base64(e.to_string()))?;
    if bytes.is_empty() {
        return Err(AssetError::Empty);
    }

    let media_type = (!media_type.is_empty()).then(|| media_type.to_string());
    Ok((media_type, bytes))
}

/// Binary content waiting to be uploaded on the next save
#[derive(Clone)]
pub struct PendingUpload {
    pub content_type: Option<String>,
    pub bytes: Arc<[u8]>,
    preview: Option<Arc<PreviewHandle>>,
}

impl PendingUpload {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            content_type: None,
            bytes: bytes.into(),
            preview: None,
        }
    }

    pub fn from_data_url(value: &str) -> Result<Self, AssetError> {
        let (content_type, bytes) = decode_data_url(value)?;
        Ok(Self {
            content_type,
            ..Self::new(bytes)
        })
    }

    /// Registers the bytes with a preview registry; the preview lives as long
    /// as this upload (or any clone of it) does.
    pub fn with_preview(mut self, registry: &PreviewRegistry) -> Self {
        self.preview = Some(Arc::new(registry.register(self.bytes.clone())));
        self
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview.as_deref().map(PreviewHandle::url)
    }

    /// Encodes the bytes back into a data URL
    pub fn to_data_url(&self) -> String {
        let media = self
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        format!("data:{};base64,{}", media, STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for PendingUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingUpload")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .field("preview", &self.preview_url())
            .finish()
    }
}

impl PartialEq for PendingUpload {
    fn eq(&self, other: &Self) -> bool {
        self.content_type == other.content_type
            && self.bytes == other.bytes
    }
}

/// Where an image comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Remote(String),
    Pending(PendingUpload),
}

impl ImageSource {
    /// Parses a client-supplied value: data URLs become pending uploads,
    /// anything else is taken as a URL.
    pub fn parse(value: &str) -> Result<Self, AssetError> {
        if is_data_url(value) {
            Ok(ImageSource::Pending(PendingUpload::from_data_url(value)?))
        } else {
            Ok(ImageSource::Remote(value.to_string()))
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ImageSource::Pending(_))
    }

    pub fn remote_url(&self) -> Option<&str> {
        match self {
            ImageSource::Remote(url) => Some(url),
            ImageSource::Pending(_) => None,
        }
    }

    /// URL the client can display right now
    pub fn display_url(&self) -> String {
        match self {
            ImageSource::Remote(url) => url.clone(),
            ImageSource::Pending(upload) => upload
                .preview_url()
                .map(str::to_string)
                .unwrap_or_else(|| upload.to_data_url()),
        }
    }
}

/// Page background: a CSS color or an image
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Color(String),
    Image(ImageSource),
}

impl Background {
    pub fn parse(value: &str) -> Result<Self, AssetError> {
        if is_color(value) {
            Ok(Background::Color(value.trim().to_string()))
        } else {
            Ok(Background::Image(ImageSource::parse(value)?))
        }
    }

    /// Rebuilds a background from its stored column value
    pub fn from_stored(value: String) -> Self {
        if is_color(&value) {
            Background::Color(value)
        } else {
            Background::Image(ImageSource::Remote(value))
        }
    }

    pub fn image(&self) -> Option<&ImageSource> {
        match self {
            Background::Color(_) => None,
            Background::Image(source) => Some(source),
        }
    }

    /// Column value once every upload is resolved; `None` while pending
    pub fn stored_value(&self) -> Option<String> {
        match self {
            Background::Color(color) => Some(color.clone()),
            Background::Image(source) => source.remote_url().map(str::to_string),
        }
    }

    pub fn display_value(&self) -> String {
        match self {
            Background::Color(color) => color.clone(),
            Background::Image(source) => source.display_url(),
        }
    }
}

type PreviewMap = Mutex<HashMap<u64, Arc<[u8]>>>;

/// Registry of in-memory image previews shown while editing.
///
/// Handles release their entry when dropped, so replacing or removing an
/// image, saving the book, or discarding the editor frees the preview.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    entries: Arc<PreviewMap>,
    next_id: Arc<AtomicU64>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, bytes: Arc<[u8]>) -> PreviewHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.entries).insert(id, bytes);
        PreviewHandle {
            id,
            url: format!("{}{}", PREVIEW_SCHEME, id),
            entries: Arc::downgrade(&self.entries),
        }
    }

    /// Bytes behind a preview URL, if the preview is still alive
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        let id: u64 = url.strip_prefix(PREVIEW_SCHEME)?.parse().ok()?;
        lock(&self.entries).get(&id).cloned()
    }

    /// Number of live previews
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock(map: &PreviewMap) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<[u8]>>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A live preview; dropping it releases the preview
pub struct PreviewHandle {
    id: u64,
    url: String,
    entries: Weak<PreviewMap>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            lock(&entries).remove(&self.id);
        }
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.url).finish()
    }
}
