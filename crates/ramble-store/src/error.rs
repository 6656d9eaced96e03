use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("invalid profile name: {0}")]
    InvalidProfile(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            rusqlite::Error::SqliteFailure(err, Some(ref msg))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::UniqueViolation(msg.clone())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(format!("serialization error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
