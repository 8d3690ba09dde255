//! Server configuration.

use std::path::PathBuf;

use crate::reflow::{ReflowOptions, DEFAULT_MAX_CHARS};

/// Configuration for a storybook server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP API binds to.
    pub bind: String,

    /// Directory holding the database and uploaded media.
    pub data_dir: PathBuf,

    /// Database URL; defaults to `storybook.db` inside the data dir.
    pub database_url: Option<String>,

    /// Base URL media is served from.
    pub public_url: String,

    /// Per-page character budget for reflow.
    pub max_chars: usize,
}

impl AppConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            data_dir,
            database_url: None,
            public_url: "/media".to_string(),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Resolved database URL
    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => {
                let path = self.data_dir.join("storybook.db");
                format!("sqlite://{}?mode=rwc", path.to_string_lossy().replace('\\', "/"))
            }
        }
    }

    /// Directory uploaded images are stored under
    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }

    pub fn reflow_options(&self) -> ReflowOptions {
        ReflowOptions::default().with_max_chars(self.max_chars)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("org", "storybook", "storybook")
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".storybook"));

        Self::new(data_dir)
    }
}
