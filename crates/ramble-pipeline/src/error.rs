use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] ramble_store::StoreError),
    #[error("llm error: {0}")]
    Llm(#[from] ramble_llm::LlmError),
    #[error("correction error: {0}")]
    Correction(#[from] ramble_correction::CorrectionError),
    #[error("unit {0} not found")]
    UnitNotFound(String),
    #[error("extraction produced no parseable JSON: {0}")]
    Unparseable(String),
    #[error("checkpoint (de)serialization failed: {0}")]
    Checkpoint(#[from] serde_json::Error),
    #[error("pipeline reached the mark stage for unit {0} with no persisted output")]
    MissingCheckpointState(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
