use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use ramble_core::{now_millis, BackoffConfig, Id, Task, TaskPriority, TaskStatus};
use ramble_store::Store;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::backoff::next_retry_at;
use crate::error::{QueueError, Result};
use crate::handler::{TaskHandler, TaskOutcome};

/// Snapshot of the runner's activity and the Store's current task counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub is_running: bool,
    pub active_tasks: usize,
    pub pending_tasks: usize,
    pub failed_tasks: usize,
}

/// Polls the Store's `tasks` table on a fixed tick and drives registered
/// handlers to completion.
pub struct TaskQueueRunner {
    store: Arc<Store>,
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
    semaphore: Arc<tokio::sync::Semaphore>,
    capacity: usize,
    poll_interval: Duration,
    max_attempts_default: u32,
    stale_after_ms: i64,
    cancel: CancellationToken,
    running: AtomicBool,
    active_tasks: AtomicUsize,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueueRunner {
    pub fn new(
        store: Arc<Store>,
        max_concurrent_tasks: usize,
        poll_interval: Duration,
        max_attempts_default: u32,
        stale_after_secs: u64,
    ) -> Self {
        Self {
            store,
            handlers: RwLock::new(HashMap::new()),
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent_tasks)),
            capacity: max_concurrent_tasks,
            poll_interval,
            max_attempts_default,
            stale_after_ms: stale_after_secs as i64 * 1000,
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
            active_tasks: AtomicUsize::new(0),
            join: Mutex::new(None),
        }
    }

    pub fn register(&self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers
            .write()
            .expect("queue handler registry poisoned")
            .insert(task_type.into(), handler);
    }

    /// Enqueue a new task with the given type, payload, and priority.
    pub fn enqueue(
        &self,
        task_type: impl Into<String>,
        payload: serde_json::Value,
        priority: TaskPriority,
        session_id: Option<Id>,
    ) -> Result<Id> {
        let now = now_millis();
        let task = Task {
            id: Id::new(),
            task_type: task_type.into(),
            payload,
            status: TaskStatus::Pending,
            priority,
            priority_value: priority.value(),
            attempts: 0,
            max_attempts: self.max_attempts_default,
            last_error: None,
            next_retry_at: None,
            backoff_config: BackoffConfig::default_spec(),
            checkpoint: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            execute_at: now,
            group_id: None,
            depends_on: None,
            session_id,
        };
        self.store.create_task(&task)?;
        Ok(task.id)
    }

    /// Spawns the poll loop as a background task and returns immediately.
    pub fn start(self: &Arc<Self>) {
        let runner = Arc::clone(self);
        let handle = tokio::spawn(async move { runner.run_loop().await });
        *self.join.lock().expect("queue join handle poisoned") = Some(handle);
    }

    /// Signals the poll loop to stop and awaits its graceful shutdown.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.join.lock().expect("queue join handle poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Current activity plus the Store's pending/failed task counts.
    pub fn get_status(&self) -> Result<QueueStatus> {
        Ok(QueueStatus {
            is_running: self.running.load(Ordering::SeqCst),
            active_tasks: self.active_tasks.load(Ordering::SeqCst),
            pending_tasks: self.store.get_tasks_by_status(TaskStatus::Pending)?.len(),
            failed_tasks: self.store.get_tasks_by_status(TaskStatus::Failed)?.len(),
        })
    }

    /// Poll loop body: runs until `self.cancel` fires. On cancellation,
    /// awaits in-flight handlers up to a grace period then force-marks any
    /// still-processing tasks back to `pending`.
    async fn run_loop(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        info!("task queue runner started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("task queue runner shutting down");
                    let grace = Duration::from_secs(5);
                    let _ = tokio::time::timeout(grace, self.drain_permits()).await;
                    if let Err(e) = self.store.recover_stale_tasks(now_millis(), 0) {
                        warn!(error = %e, "failed to reset in-flight tasks on shutdown");
                    }
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    if let Err(e) = self.store.recover_stale_tasks(now_millis(), self.stale_after_ms) {
                        warn!(error = %e, "stale task recovery failed");
                    }
                    self.clone().tick();
                }
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    async fn drain_permits(&self) {
        let _ = self.semaphore.acquire_many(self.capacity as u32).await;
    }

    fn tick(self: Arc<Self>) {
        while let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            let now = now_millis();
            match self.store.claim_next_task(now) {
                Ok(Some(task)) => {
                    let runner = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _permit = permit;
                        runner.execute_claimed(task).await;
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "failed to claim task");
                    break;
                }
            }
        }
    }

    async fn execute_claimed(&self, task: Task) {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        self.run_handler(task).await;
        self.active_tasks.fetch_sub(1, Ordering::SeqCst);
    }

    async fn run_handler(&self, task: Task) {
        let handler = {
            let handlers = self.handlers.read().expect("queue handler registry poisoned");
            handlers.get(&task.task_type).cloned()
        };

        let Some(handler) = handler else {
            let err = QueueError::NoHandler(task.task_type.clone()).to_string();
            let _ = self.store.fail_task(&task.id, &err, task.attempts, None);
            return;
        };

        let mut checkpoint = task.checkpoint.clone();
        loop {
            match handler.execute(&task.payload, checkpoint.as_ref()).await {
                Ok(TaskOutcome::Progress(next)) => {
                    if let Err(e) = self.store.save_checkpoint(&task.id, &next) {
                        error!(task_id = %task.id, error = %e, "failed to save checkpoint");
                        return;
                    }
                    checkpoint = Some(next);
                }
                Ok(TaskOutcome::Done(_result)) => {
                    if let Err(e) = self.store.complete_task(&task.id, now_millis()) {
                        error!(task_id = %task.id, error = %e, "failed to mark task completed");
                    }
                    return;
                }
                Err(e) => {
                    let attempts = task.attempts + 1;
                    if attempts >= task.max_attempts {
                        warn!(task_id = %task.id, attempts, "task exhausted retries");
                        let _ = self.store.fail_task(&task.id, &e.to_string(), attempts, None);
                    } else {
                        let retry_at = next_retry_at(now_millis(), attempts, &task.backoff_config);
                        let _ = self
                            .store
                            .fail_task(&task.id, &e.to_string(), attempts, Some(retry_at));
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl TaskHandler for CountingHandler {
        async fn execute(
            &self,
            _payload: &serde_json::Value,
            _checkpoint: Option<&ramble_core::Checkpoint>,
        ) -> std::result::Result<TaskOutcome, anyhow::Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(TaskOutcome::Done(serde_json::json!({"ok": true})))
        }
    }

    #[tokio::test]
    async fn enqueued_task_is_claimed_and_completed() {
        let store = Arc::new(Store::in_memory("default").unwrap());
        let runner = Arc::new(TaskQueueRunner::new(
            Arc::clone(&store),
            4,
            Duration::from_millis(10),
            3,
            300,
        ));
        let counter = Arc::new(AtomicUsize::new(0));
        runner.register("noop", Arc::new(CountingHandler(Arc::clone(&counter))));

        let id = runner.enqueue("noop", serde_json::json!({}), TaskPriority::Normal, None).unwrap();

        let claimed = store.claim_next_task(now_millis()).unwrap().unwrap();
        assert_eq!(claimed.id.as_str(), id.as_str());

        runner.execute_claimed(claimed).await;
        let task = store.get_task(&id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_handler_fails_task_immediately() {
        let store = Arc::new(Store::in_memory("default").unwrap());
        let runner = Arc::new(TaskQueueRunner::new(Arc::clone(&store), 4, Duration::from_millis(10), 3, 300));
        let id = runner.enqueue("unknown", serde_json::json!({}), TaskPriority::Low, None).unwrap();
        let claimed = store.claim_next_task(now_millis()).unwrap().unwrap();
        runner.execute_claimed(claimed).await;
        let task = store.get_task(&id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }
}
