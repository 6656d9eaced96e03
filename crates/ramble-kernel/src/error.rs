use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("store error: {0}")]
    Store(#[from] ramble_store::StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] ramble_queue::QueueError),
    #[error("correction error: {0}")]
    Correction(#[from] ramble_correction::CorrectionError),
    #[error("goal error: {0}")]
    Goal(#[from] ramble_goals::GoalError),
    #[error("observer error: {0}")]
    Observer(#[from] ramble_observer::ObserverError),
    #[error("input is empty after sanitization")]
    EmptyInput,
    #[error("no active session")]
    NoActiveSession,
    #[error("backup is malformed: {0}")]
    MalformedBackup(String),
    #[error("table '{0}' failed to restore: {1}")]
    RestoreFailed(String, String),
}

pub type Result<T> = std::result::Result<T, KernelError>;
