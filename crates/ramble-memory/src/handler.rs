use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use ramble_core::{Checkpoint, MemoryConfig};
use ramble_queue::{TaskHandler, TaskOutcome};
use ramble_store::Store;

use crate::decay::decay_claims;

/// Wraps `decay_claims` as the `decay_claims` queue task, fired hourly by
/// the cron scheduler and directly callable from tests without waiting
/// for the clock.
pub struct DecayClaimsHandler {
    store: Arc<Store>,
    config: MemoryConfig,
}

impl DecayClaimsHandler {
    pub fn new(store: Arc<Store>, config: MemoryConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl TaskHandler for DecayClaimsHandler {
    async fn execute(
        &self,
        _payload: &serde_json::Value,
        _checkpoint: Option<&Checkpoint>,
    ) -> Result<TaskOutcome, anyhow::Error> {
        let report = decay_claims(&self.store, &self.config)?;
        tracing::info!(
            processed = report.processed_count,
            decayed = report.decayed_count,
            stale = report.stale_count,
            dormant = report.dormant_count,
            promoted = report.promoted_count,
            "decay pass complete"
        );
        Ok(TaskOutcome::Done(json!(report)))
    }
}
