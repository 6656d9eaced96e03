use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("store error: {0}")]
    Store(#[from] ramble_store::StoreError),
}

pub type Result<T> = std::result::Result<T, ObserverError>;
