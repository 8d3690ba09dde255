//! Object storage for uploaded images.
//!
//! Objects live at `{user_id}/{book_id}/{file_name}`, where the file name is
//! derived from the content hash and the sniffed image format, so uploading
//! the same bytes twice lands on the same object.

use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use thiserror::Error;
use tokio::fs;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported image format")]
    UnsupportedImage,
    #[error("Invalid object path: {0}")]
    InvalidPath(String),
}

/// Result of a `put`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
    /// `false` when an identical object already existed
    pub created: bool,
}

/// Blob store the save path uploads into
pub trait ObjectStore: Send + Sync {
    fn put<'a>(&'a self, path: &'a str, bytes: &'a [u8]) -> BoxFuture<'a, Result<StoredObject, StorageError>>;

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), StorageError>>;

    /// Public URL of an object path
    fn url_for(&self, path: &str) -> String;

    /// Object path behind a URL, if the URL points into this store
    fn path_for_url(&self, url: &str) -> Option<String>;
}

fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// `{user_id}/{book_id}/{file_name}` with every segment made path-safe
pub fn object_path(user_id: &str, book_id: i64, file_name: &str) -> String {
    format!(
        "{}/{}/{}",
        sanitize_segment(user_id),
        book_id,
        sanitize_segment(file_name)
    )
}

/// Whether `path` is an object of book `book_id` owned by `user_id`
pub fn owned_by(path: &str, user_id: &str, book_id: i64) -> bool {
    let mut segments = path.split('/');
    segments.next() == Some(sanitize_segment(user_id).as_str())
        && segments.next() == Some(book_id.to_string().as_str())
        && segments.next().is_some_and(|name| !name.is_empty())
        && segments.next().is_none()
}

/// Content-addressed file name, e.g. `page-1a2b3c4d5e6f7a8b.png`
pub fn object_file_name(kind: &str, bytes: &[u8]) -> Result<String, StorageError> {
    let format = image::guess_format(bytes).map_err(|_| StorageError::UnsupportedImage)?;
    let ext = format
        .extensions_str()
        .first()
        .copied()
        .ok_or(StorageError::UnsupportedImage)?;

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let hash = format!("{:x}", hasher.finalize());
    Ok(format!("{}-{}.{}", kind, &hash[..16], ext))
}

/// Stores objects under a directory served at `public_base_url`
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut full = self.root.clone();
        for segment in path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(StorageError::InvalidPath(path.to_string()));
            }
            full.push(segment);
        }
        Ok(full)
    }
}

impl ObjectStore for LocalObjectStore {
    fn put<'a>(&'a self, path: &'a str, bytes: &'a [u8]) -> BoxFuture<'a, Result<StoredObject, StorageError>> {
        Box::pin(async move {
            let full = self.resolve(path)?;
            let created = if fs::try_exists(&full).await? {
                false
            } else {
                if let Some(parent) = full.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(&full, bytes).await?;
                true
            };
            tracing::debug!(path, created, size = bytes.len(), "object stored");

            Ok(StoredObject {
                path: path.to_string(),
                url: self.url_for(path),
                created,
            })
        })
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let full = self.resolve(path)?;
            match fs::remove_file(&full).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        let path = url
            .strip_prefix(&self.public_base_url)?
            .strip_prefix('/')?;
        (!path.is_empty()).then(|| path.to_string())
    }
}
