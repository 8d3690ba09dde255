use crate::error::Error;
use crate::models::CatalogEntry;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::str::FromStr;

/// The lookup tables a book references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Authors,
    Characters,
    Categories,
    Genres,
    Tags,
    Values,
    Levels,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 7] = [
        CatalogKind::Authors,
        CatalogKind::Characters,
        CatalogKind::Categories,
        CatalogKind::Genres,
        CatalogKind::Tags,
        CatalogKind::Values,
        CatalogKind::Levels,
    ];

    /// Kinds linked through a `book_<kind>` junction table
    pub const LINKED: [CatalogKind; 6] = [
        CatalogKind::Authors,
        CatalogKind::Characters,
        CatalogKind::Categories,
        CatalogKind::Genres,
        CatalogKind::Tags,
        CatalogKind::Values,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Authors => "authors",
            CatalogKind::Characters => "characters",
            CatalogKind::Categories => "categories",
            CatalogKind::Genres => "genres",
            CatalogKind::Tags => "tags",
            CatalogKind::Values => "story_values",
            CatalogKind::Levels => "levels",
        }
    }

    /// Junction table; levels are a plain column on `books`
    pub fn junction(&self) -> Option<&'static str> {
        match self {
            CatalogKind::Authors => Some("book_authors"),
            CatalogKind::Characters => Some("book_characters"),
            CatalogKind::Categories => Some("book_categories"),
            CatalogKind::Genres => Some("book_genres"),
            CatalogKind::Tags => Some("book_tags"),
            CatalogKind::Values => Some("book_values"),
            CatalogKind::Levels => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            CatalogKind::Authors => "author_id",
            CatalogKind::Characters => "character_id",
            CatalogKind::Categories => "category_id",
            CatalogKind::Genres => "genre_id",
            CatalogKind::Tags => "tag_id",
            CatalogKind::Values => "value_id",
            CatalogKind::Levels => "level_id",
        }
    }
}

impl FromStr for CatalogKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authors" => Ok(CatalogKind::Authors),
            "characters" => Ok(CatalogKind::Characters),
            "categories" => Ok(CatalogKind::Categories),
            "genres" => Ok(CatalogKind::Genres),
            "tags" => Ok(CatalogKind::Tags),
            "values" => Ok(CatalogKind::Values),
            "levels" => Ok(CatalogKind::Levels),
            other => Err(Error::Message(format!("Unknown catalog: {}", other))),
        }
    }
}

pub async fn list_catalog(pool: &SqlitePool, kind: CatalogKind) -> Result<Vec<CatalogEntry>, Error> {
    let entries = sqlx::query_as::<_, CatalogEntry>(&format!(
        "SELECT id, name FROM {} ORDER BY name COLLATE NOCASE, id",
        kind.table()
    ))
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Adds a name to a catalog; an existing entry with the same name is returned as is
pub async fn add_catalog_entry(
    pool: &SqlitePool,
    kind: CatalogKind,
    name: &str,
) -> Result<CatalogEntry, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::from("name cannot be empty".to_string()));
    }

    sqlx::query(&format!("INSERT OR IGNORE INTO {} (name) VALUES (?)", kind.table()))
        .bind(name)
        .execute(pool)
        .await?;

    let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
        "SELECT id, name FROM {} WHERE name = ?",
        kind.table()
    ))
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::memory_db;

    #[tokio::test]
    async fn test_add_and_list() {
        let pool = memory_db().await;
        let b = add_catalog_entry(&pool, CatalogKind::Genres, "Fable").await.unwrap();
        let a = add_catalog_entry(&pool, CatalogKind::Genres, " adventure ").await.unwrap();
        assert_eq!(a.name, "adventure");

        let again = add_catalog_entry(&pool, CatalogKind::Genres, "Fable").await.unwrap();
        assert_eq!(again, b);

        let genres = list_catalog(&pool, CatalogKind::Genres).await.unwrap();
        assert_eq!(genres, vec![a, b]);
        assert!(list_catalog(&pool, CatalogKind::Tags).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let pool = memory_db().await;
        let err = add_catalog_entry(&pool, CatalogKind::Authors, "   ").await.unwrap_err();
        assert_eq!(err.to_string(), "name cannot be empty");
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!("values".parse::<CatalogKind>().unwrap(), CatalogKind::Values);
        assert_eq!(CatalogKind::Values.table(), "story_values");
        assert!("publishers".parse::<CatalogKind>().is_err());
        assert_eq!(CatalogKind::Levels.junction(), None);
    }
}
