use async_trait::async_trait;
use ramble_core::Checkpoint;

/// Result of one `TaskHandler::execute` call.
pub enum TaskOutcome {
    /// Work remains; persist `Checkpoint` and re-poll the same task
    /// immediately without releasing it back to `pending`.
    Progress(Checkpoint),
    /// The task is finished; the payload is stored as the task's result.
    Done(serde_json::Value),
}

/// A handler for one `task_type`. Implementations should be idempotent
/// with respect to `checkpoint` — the runner may call `execute` again on
/// the same task after a crash with the last saved checkpoint.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(
        &self,
        payload: &serde_json::Value,
        checkpoint: Option<&Checkpoint>,
    ) -> Result<TaskOutcome, anyhow::Error>;
}
