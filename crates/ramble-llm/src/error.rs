use thiserror::Error;

/// Failure modes for a single LLM call, classified by retryability.
#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited: {0}")]
    RateLimit(String),
    #[error("request timed out")]
    Timeout,
    #[error("bad response: {0}")]
    BadResponse(String),
}

impl LlmError {
    /// Network/RateLimit/Timeout always retry; BadResponse retries only
    /// up to the caller's `max_attempts`.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::RateLimit(_) | LlmError::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
