use crate::assets::AssetError;
use crate::editor::EditorError;
use crate::storage::StorageError;
use crate::validation::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Invalid image: {0}")]
    Asset(#[from] AssetError),
    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),
    #[error("Validation failed: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),
    #[error("Book {0} not found")]
    BookNotFound(i64),
    #[error("Book {0} belongs to another user")]
    Forbidden(i64),
    #[error("Missing user id")]
    Unauthorized,
    #[error("{0}")]
    Message(String),
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Vec<ValidationError>> for Error {
    fn from(errors: Vec<ValidationError>) -> Self {
        Error::Validation(errors)
    }
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Message(error)
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&format!("{}", self))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_message() {
        let err = Error::Validation(vec![ValidationError::MissingTitle, ValidationError::NoGenres]);
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            "\"Validation failed: Title cannot be empty; At least one genre is required\""
        );
        let err: Error = "name cannot be empty".to_string().into();
        assert_eq!(serde_json::to_string(&err).unwrap(), "\"name cannot be empty\"");
    }
}
