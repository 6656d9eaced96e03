use thiserror::Error;

/// Errors raised by shared core helpers (profile validation, id/time parsing).
///
/// Component-specific errors (`StoreError`, `QueueError`, `LlmError`, ...)
/// live in their own crates; this enum only covers the handful of checks
/// `ramble-core` itself performs.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
