use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("store error: {0}")]
    Store(#[from] ramble_store::StoreError),
    #[error("no handler registered for task type {0:?}")]
    NoHandler(String),
    #[error("task failed: {0}")]
    HandlerFailed(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
