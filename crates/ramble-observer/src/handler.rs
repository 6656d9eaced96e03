use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use ramble_core::{now_millis, Checkpoint, Id};
use ramble_queue::{TaskHandler, TaskOutcome};

use crate::observer::ObserverContext;
use crate::registry::ObserverDispatcher;

/// Payload for the `run_observer` task type, enqueued by the cron
/// scheduler for observers registered with the `schedule` trigger.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunObserverPayload {
    pub session_id: Option<String>,
}

/// Wraps `ObserverDispatcher::on_schedule` as a queue task so scheduled
/// observer runs go through the same retry/backoff machinery as
/// everything else instead of firing from the cron timer directly.
pub struct RunObserverHandler {
    dispatcher: Arc<ObserverDispatcher>,
}

impl RunObserverHandler {
    pub fn new(dispatcher: Arc<ObserverDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl TaskHandler for RunObserverHandler {
    async fn execute(
        &self,
        payload: &serde_json::Value,
        _checkpoint: Option<&Checkpoint>,
    ) -> Result<TaskOutcome, anyhow::Error> {
        let payload: RunObserverPayload = serde_json::from_value(payload.clone())?;
        let ctx = ObserverContext {
            new_claims: Vec::new(),
            session_id: payload.session_id.map(|s| Id::from(s)),
            timestamp: now_millis(),
        };
        let outputs = self.dispatcher.on_schedule(&ctx).await?;
        Ok(TaskOutcome::Done(json!({ "outputs_produced": outputs.len() })))
    }
}
