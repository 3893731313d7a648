#![forbid(unsafe_code)]

use sm_core::ShelfError;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    InvalidInput(&'static str),
    UnknownId(String),
    NotAFolder(String),
    TopLevelImmovable(String),
    Cycle { id: String, parent_id: String },
    FolderNotEmpty(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "json: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownId(id) => write!(f, "unknown id: {id}"),
            Self::NotAFolder(id) => write!(f, "node is not a folder: {id}"),
            Self::TopLevelImmovable(id) => {
                write!(f, "top-level container cannot be moved or removed: {id}")
            }
            Self::Cycle { id, parent_id } => write!(
                f,
                "cannot move a node into its own descendant (id={id}, parent_id={parent_id})"
            ),
            Self::FolderNotEmpty(id) => write!(f, "folder is not empty: {id}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<StoreError> for ShelfError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UnknownId(id) => ShelfError::not_found(&id),
            StoreError::Io(_) | StoreError::Sql(_) | StoreError::Json(_) => {
                ShelfError::StoreUnavailable(value.to_string())
            }
            StoreError::InvalidInput(_)
            | StoreError::NotAFolder(_)
            | StoreError::TopLevelImmovable(_)
            | StoreError::Cycle { .. }
            | StoreError::FolderNotEmpty(_) => ShelfError::InvalidOperation(value.to_string()),
        }
    }
}
