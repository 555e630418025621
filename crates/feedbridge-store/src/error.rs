use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed event id: {0}")]
    BadId(String),
}

impl From<StoreError> for feedbridge_core::BridgeError {
    fn from(e: StoreError) -> Self {
        feedbridge_core::BridgeError::Persistence(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
