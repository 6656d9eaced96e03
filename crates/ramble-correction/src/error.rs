use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("store error: {0}")]
    Store(#[from] ramble_store::StoreError),
    #[error("invalid correction utterance: {0}")]
    InvalidUtterance(String),
}

pub type Result<T> = std::result::Result<T, CorrectionError>;
