use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ramble_core::event::EventBus;
use ramble_core::{
    now_millis, AppConfig, ConversationUnit, DiscourseFunction, Id, MemoryConfig, RambleEvent, Session, Source,
    Speaker, TaskPriority, TaskStatus,
};
use ramble_correction::CorrectionService;
use ramble_goals::GoalManager;
use ramble_llm::{HttpLlmClient, ModelConfig, RetryingLlmClient};
use ramble_memory::DecayClaimsHandler;
use ramble_observer::{ContradictionObserver, ObserverDispatcher, PatternObserver, RunObserverHandler};
use ramble_pipeline::{ExtractFromUnitHandler, ExtractionPipeline};
use ramble_queue::TaskQueueRunner;
use ramble_store::Store;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backup::{export_backup, import_backup, BackupDocument};
use crate::debug::DebugFacade;
use crate::error::{KernelError, Result};
use crate::lens::LensRouter;
use crate::scheduler::Scheduler;
use crate::session::SessionManager;
use crate::text;

/// `pendingTasks > softLimit` signals `Backpressure` back to the caller
/// of `processText` rather than rejecting the input.
const DEFAULT_BACKPRESSURE_SOFT_LIMIT: usize = 500;

/// Result of one `processText` call.
#[derive(Debug, Clone)]
pub struct ProcessTextResult {
    pub unit_id: Id,
    pub discourse_function: DiscourseFunction,
    pub captured_by_lens: bool,
    pub corrections_applied: Vec<Id>,
    pub task_id: Option<Id>,
    pub backpressure: bool,
}

/// Wires every module into one running instance: open the Store, build
/// the stateless services, register task handlers on the queue, then
/// start the queue and scheduler as background tasks.
pub struct Kernel {
    store: Arc<Store>,
    events: Arc<EventBus>,
    session: SessionManager,
    lens: LensRouter,
    goals: GoalManager,
    dispatcher: Arc<ObserverDispatcher>,
    correction: CorrectionService,
    queue: Arc<TaskQueueRunner>,
    memory_config: MemoryConfig,
    cancel: CancellationToken,
    scheduler_task: Option<JoinHandle<()>>,
    pub debug: DebugFacade,
}

impl Kernel {
    pub async fn initialize(data_dir: &Path, profile: &str, config: AppConfig) -> Result<Self> {
        let store = Arc::new(Store::open(data_dir, profile)?);
        let events = Arc::new(EventBus::new(256));

        let goals = GoalManager::new(store.clone(), config.goal.clone());
        let correction = CorrectionService::default();

        let mut dispatcher = ObserverDispatcher::new(store.clone());
        dispatcher.register(Arc::new(ContradictionObserver))?;
        dispatcher.register(Arc::new(PatternObserver))?;
        let dispatcher = Arc::new(dispatcher);

        let model = ModelConfig {
            provider: config.llm.provider.clone(),
            model_id: config.llm.model_id.clone(),
            api_key: config.llm.api_key.clone(),
            base_url: config.llm.base_url.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        };
        let llm = Arc::new(
            RetryingLlmClient::new(HttpLlmClient::new(), config.llm.max_retries).with_backoff(
                config.llm.initial_backoff_ms,
                config.llm.max_backoff_ms,
                2.0,
                0.2,
            ),
        );
        let pipeline = Arc::new(ExtractionPipeline::new(store.clone(), llm, model, &config));

        let queue = Arc::new(TaskQueueRunner::new(
            store.clone(),
            config.queue.max_concurrent_tasks,
            Duration::from_millis(config.queue.poll_interval_ms),
            config.queue.max_attempts,
            config.queue.stale_after_secs,
        ));
        queue.register("extract_from_unit", Arc::new(ExtractFromUnitHandler::new(pipeline)));
        queue.register(
            "decay_claims",
            Arc::new(DecayClaimsHandler::new(store.clone(), config.memory.clone())),
        );
        queue.register("run_observer", Arc::new(RunObserverHandler::new(dispatcher.clone())));

        let session = SessionManager::new(store.clone());
        let active = session.initialize()?;
        events.publish(RambleEvent::SessionStarted { session_id: active.id.clone() });

        let cancel = CancellationToken::new();
        queue.start();

        let scheduler = Scheduler::new(
            config.memory.decay_interval_secs,
            config.observer.schedule_interval_secs,
            queue.clone(),
            cancel.clone(),
        );
        let scheduler_task = Some(tokio::spawn(async move { scheduler.run().await }));

        let debug = DebugFacade::new(store.clone());
        let memory_config = config.memory.clone();

        info!(profile = %profile, "kernel initialized");

        Ok(Self {
            store,
            events,
            session,
            lens: LensRouter::new(),
            goals,
            dispatcher,
            correction,
            queue,
            memory_config,
            cancel,
            scheduler_task,
            debug,
        })
    }

    pub fn memory_config(&self) -> &MemoryConfig {
        &self.memory_config
    }

    /// Starts a new conversation session, ending whatever was active.
    pub fn start_session(&self) -> Result<Session> {
        let session = self.session.start_session()?;
        self.events.publish(RambleEvent::SessionStarted { session_id: session.id.clone() });
        Ok(session)
    }

    /// Ends the active session, if any.
    pub fn end_session(&self) -> Result<()> {
        if let Some(active) = self.session.get_active_session()? {
            self.session.end_session(None)?;
            self.events.publish(RambleEvent::SessionEnded { session_id: active.id });
        }
        Ok(())
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn goals(&self) -> &GoalManager {
        &self.goals
    }

    pub fn lens(&self) -> &LensRouter {
        &self.lens
    }

    pub fn dispatcher(&self) -> Arc<ObserverDispatcher> {
        self.dispatcher.clone()
    }

    pub fn queue(&self) -> Arc<TaskQueueRunner> {
        self.queue.clone()
    }

    /// Stops the scheduler and queue, waits for their in-flight work to
    /// settle, then ends the active session.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        self.queue.stop().await;
        if let Some(task) = self.scheduler_task.take() {
            let _ = task.await;
        }
        if let Some(active) = self.session.get_active_session()? {
            self.session.end_session(None)?;
            self.events.publish(RambleEvent::SessionEnded { session_id: active.id });
        }
        Ok(())
    }

    /// Sanitizes, classifies, persists, and enqueues one conversation
    /// turn. Input captured by an active lens is diverted
    /// before any of that happens.
    pub fn process_text(&self, raw_text: &str, source: Source) -> Result<ProcessTextResult> {
        let sanitized = text::sanitize(raw_text);
        if sanitized.is_empty() {
            return Err(KernelError::EmptyInput);
        }

        if self.lens.route(&sanitized) {
            let lens_id = self.lens.active_lens().unwrap_or_default();
            self.events.publish(RambleEvent::LensInput { lens_id, text: sanitized });
            return Ok(ProcessTextResult {
                unit_id: Id::new(),
                discourse_function: DiscourseFunction::Assert,
                captured_by_lens: true,
                corrections_applied: Vec::new(),
                task_id: None,
                backpressure: false,
            });
        }

        let session = match self.session.get_active_session()? {
            Some(s) => s,
            None => self.session.start_session()?,
        };
        self.events.publish(RambleEvent::PipelineInputReceived {
            session_id: session.id.clone(),
            source: source_label(source).to_string(),
        });

        let discourse_function = text::infer_discourse_function(&sanitized);

        let mut corrections_applied = Vec::new();
        let final_text = if source == Source::Speech {
            if let Some(correction) = self.correction.learn_from_utterance(&self.store, &sanitized, None)? {
                corrections_applied.push(correction.id);
            }
            let known = self.store.get_all_corrections()?;
            let applied = self.correction.apply(&sanitized, &known);
            corrections_applied.extend(applied.applied);
            applied.text
        } else {
            sanitized
        };

        let now = now_millis();
        let unit = ConversationUnit {
            id: Id::new(),
            session_id: session.id.clone(),
            timestamp: now,
            raw_text: raw_text.to_string(),
            sanitized_text: final_text,
            source,
            speaker: Speaker::User,
            discourse_function,
            preceding_context_summary: None,
            created_at: now,
            processed: false,
        };
        self.store.create_unit(&unit)?;
        self.session.increment_unit_count(&session.id)?;

        let task_id = self.queue.enqueue(
            "extract_from_unit",
            serde_json::json!({ "unit_id": unit.id.to_string() }),
            TaskPriority::Critical,
            Some(session.id.clone()),
        )?;

        let pending = self.store.get_tasks_by_status(TaskStatus::Pending)?.len()
            + self.store.get_tasks_by_status(TaskStatus::Processing)?.len();

        Ok(ProcessTextResult {
            unit_id: unit.id,
            discourse_function,
            captured_by_lens: false,
            corrections_applied,
            task_id: Some(task_id),
            backpressure: pending > DEFAULT_BACKPRESSURE_SOFT_LIMIT,
        })
    }

    pub fn export_backup(&self) -> Result<BackupDocument> {
        export_backup(&self.store)
    }

    pub fn import_backup(&self, doc: &BackupDocument) -> Result<()> {
        import_backup(&self.store, doc)
    }
}

fn source_label(source: Source) -> &'static str {
    match source {
        Source::Speech => "speech",
        Source::Text => "text",
    }
}
