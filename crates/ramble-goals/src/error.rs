use thiserror::Error;

use ramble_core::Id;

#[derive(Debug, Error)]
pub enum GoalError {
    #[error("store error: {0}")]
    Store(#[from] ramble_store::StoreError),
    #[error("goal {0} not found")]
    NotFound(Id),
    #[error("hierarchy depth exceeded: parent already at max depth")]
    TooDeep,
    #[error("setting parent would create a cycle")]
    Cycle,
}

pub type Result<T> = std::result::Result<T, GoalError>;
