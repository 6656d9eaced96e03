use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use ramble_core::{
    now_millis, AppConfig, Attitude, Checkpoint, Claim, ClaimState, ExtractionProgramRecord, Goal, GoalStatus, Id,
    MemoryTier, ProgressType, Proposition, Source, Stakes, Stance, Temporality, Timeframe,
};
use ramble_correction::{CorrectionService, PhoneticMatcher};
use ramble_llm::{parse_llm_json, LlmClient, LlmMessage, LlmRequest, ModelConfig};
use ramble_queue::{TaskHandler, TaskOutcome};
use ramble_store::Store;

use crate::context::ContextBuilder;
use crate::error::{PipelineError, Result};
use crate::normalize::{normalize, NormalizedExtraction};

/// Output of one pipeline run over a conversation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub propositions: Vec<Id>,
    pub stances: Vec<Id>,
    pub claims: Vec<Id>,
    pub entities: Vec<Id>,
    pub goals: Vec<Id>,
    pub corrections: Vec<Id>,
    pub extractors_run: Vec<String>,
    pub processing_time_ms: u64,
    pub repaired: bool,
}

/// Where a single `run` call landed: either one more checkpointed stage
/// completed, or the pipeline is done with the unit.
pub enum PipelineStep {
    Progress(Checkpoint),
    Done(PipelineOutput),
}

/// The ordered stage names a pipeline run checkpoints after. Stale-task
/// recovery resumes from whichever of these the last saved checkpoint
/// names, instead of starting over at "context".
const STAGES: [&str; 6] = ["context", "hints", "llm", "normalize", "persist", "mark"];

/// Everything carried between stages via the task's persisted
/// checkpoint, so a resumed run can skip completed stages — in
/// particular, so it never repeats the LLM call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ResumeState {
    context: Option<String>,
    hints: Option<String>,
    raw: Option<serde_json::Value>,
    repaired: bool,
    normalized: Option<NormalizedExtraction>,
    output: Option<PipelineOutput>,
}

impl ResumeState {
    fn from_checkpoint(checkpoint: Option<&Checkpoint>) -> Result<(Self, Vec<String>)> {
        match checkpoint {
            Some(cp) => {
                let state = match &cp.intermediate_data {
                    Some(data) => serde_json::from_value(data.clone())?,
                    None => ResumeState::default(),
                };
                Ok((state, cp.completed_steps.clone()))
            }
            None => Ok((ResumeState::default(), Vec::new())),
        }
    }

    fn checkpoint(&self, completed_steps: Vec<String>) -> Result<Checkpoint> {
        Ok(Checkpoint {
            step: completed_steps.last().cloned().unwrap_or_default(),
            step_index: completed_steps.len() as u32,
            total_steps: Some(STAGES.len() as u32),
            intermediate_data: Some(serde_json::to_value(self)?),
            completed_steps,
        })
    }
}

/// The extraction pipeline: context assembly, phonetic hinting, a single
/// LLM call, normalization, and persistence, run once per conversation
/// unit across six checkpointed stages so a crash mid-run resumes at the
/// right stage instead of repeating the LLM call.
pub struct ExtractionPipeline {
    store: Arc<Store>,
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    correction_service: CorrectionService,
    phonetic: PhoneticMatcher,
    context_window_units: usize,
    min_confidence: f64,
    active_program: String,
}

impl ExtractionPipeline {
    pub fn new(store: Arc<Store>, llm: Arc<dyn LlmClient>, model: ModelConfig, config: &AppConfig) -> Self {
        Self {
            store,
            llm,
            model,
            correction_service: CorrectionService::default(),
            phonetic: PhoneticMatcher::default(),
            context_window_units: config.pipeline.context_window_units,
            min_confidence: config.pipeline.min_confidence,
            active_program: config.pipeline.active_program.clone(),
        }
    }

    /// Advances the unit one checkpointed stage: `"context"`, `"hints"`,
    /// `"llm"`, `"normalize"`, `"persist"`, `"mark"`. Pass back the
    /// `Checkpoint` from the previous `Progress` result (or `None` for a
    /// fresh task) and the caller loops until it sees `Done`.
    pub async fn run(&self, unit_id: &Id, checkpoint: Option<&Checkpoint>) -> Result<PipelineStep> {
        let start = Instant::now();
        let unit = self.store.get_unit(unit_id)?.ok_or_else(|| PipelineError::UnitNotFound(unit_id.to_string()))?;
        let (mut state, mut done) = ResumeState::from_checkpoint(checkpoint)?;
        let has = |name: &str| done.iter().any(|s| s == name);

        if !has("context") {
            state.context = Some(ContextBuilder::new(&self.store, self.context_window_units).build(&unit)?);
            done.push("context".to_string());
            return Ok(PipelineStep::Progress(state.checkpoint(done)?));
        }

        if !has("hints") {
            // Speech gets full phonetic hinting; typed text gets spelling hints only.
            state.hints = Some(self.build_hints(&unit.sanitized_text, unit.source)?);
            done.push("hints".to_string());
            return Ok(PipelineStep::Progress(state.checkpoint(done)?));
        }

        if !has("llm") {
            let context = state.context.clone().unwrap_or_default();
            let hints = state.hints.clone().unwrap_or_default();
            let system_prompt = build_system_prompt(&context, &hints);
            let request = LlmRequest {
                model: ModelConfig { temperature: 0.3, ..self.model.clone() },
                system_prompt: Some(system_prompt),
                messages: vec![LlmMessage { role: "user".to_string(), content: unit.sanitized_text.clone() }],
            };
            let response = self.llm.call(request).await?;
            let extraction = parse_llm_json(&response.content);

            let Some(raw) = extraction.data else {
                self.log_extraction(unit_id, false)?;
                self.store.mark_unit_processed(unit_id)?;
                return Err(PipelineError::Unparseable(extraction.error.unwrap_or_default()));
            };
            state.raw = Some(raw);
            state.repaired = extraction.repaired;
            done.push("llm".to_string());
            return Ok(PipelineStep::Progress(state.checkpoint(done)?));
        }

        if !has("normalize") {
            let raw = state.raw.clone().unwrap_or(serde_json::Value::Null);
            state.normalized = Some(normalize(&raw));
            done.push("normalize".to_string());
            return Ok(PipelineStep::Progress(state.checkpoint(done)?));
        }

        if !has("persist") {
            let normalized = state.normalized.clone().unwrap_or_default();
            let output = self.persist(&unit, normalized, state.repaired, start.elapsed().as_millis() as u64)?;
            state.output = Some(output);
            done.push("persist".to_string());
            return Ok(PipelineStep::Progress(state.checkpoint(done)?));
        }

        self.store.mark_unit_processed(unit_id)?;
        done.push("mark".to_string());
        let output = state.output.take().ok_or_else(|| PipelineError::MissingCheckpointState(unit_id.to_string()))?;
        Ok(PipelineStep::Done(output))
    }

    fn build_hints(&self, text: &str, source: Source) -> Result<String> {
        let vocabulary = self.store.get_all_vocabulary()?;
        let entities = self.store.get_all_entities()?;

        let mut all_hints = Vec::new();
        for token in text.split_whitespace() {
            let cleaned: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
            if cleaned.len() < 3 {
                continue;
            }
            if matches!(source, Source::Speech) {
                let known = vocabulary.iter().map(|v| (v.correct_spelling.as_str(), v.phonetic_primary.as_str()));
                all_hints.extend(self.phonetic.phonetic_matches(&cleaned, known));
            }
            all_hints.extend(self.phonetic.fuzzy_matches(&cleaned, &entities));
        }
        Ok(PhoneticMatcher::format_hints(&all_hints))
    }

    fn log_extraction(&self, _unit_id: &Id, success: bool) -> Result<()> {
        if self.store.get_active_extraction_program()?.is_none() {
            self.store.register_extraction_program(&ExtractionProgramRecord {
                id: self.active_program.clone(),
                name: self.active_program.clone(),
                version: "1".to_string(),
                active: true,
            })?;
        }
        if !success {
            warn!(program = %self.active_program, "extraction produced no usable JSON");
        }
        Ok(())
    }

    fn persist(
        &self,
        unit: &ramble_core::ConversationUnit,
        normalized: NormalizedExtraction,
        repaired: bool,
        processing_time_ms: u64,
    ) -> Result<PipelineOutput> {
        let now = now_millis();
        self.log_extraction(&unit.id, true)?;

        let proposition = Proposition { id: Id::new(), unit_id: unit.id.clone(), tokens: unit.sanitized_text.clone() };
        self.store.create_proposition(&proposition)?;
        let stance = Stance { id: Id::new(), proposition_id: proposition.id.clone(), attitude: Attitude::Asserted, intensity: 1.0 };
        self.store.create_stance(&stance)?;

        let mut entity_ids = Vec::new();
        for entity in &normalized.entities {
            let (record, _created) = self.store.find_or_create_entity(&entity.name, &entity.entity_type, now)?;
            entity_ids.push(record.id);
        }

        let mut claim_ids = Vec::new();
        for claim in &normalized.claims {
            let confidence = claim.importance.unwrap_or(0.5).max(self.min_confidence);
            let record = Claim {
                id: Id::new(),
                statement: claim.content.clone(),
                subject: claim.content.clone(),
                claim_type: claim.claim_type.clone(),
                temporality: Temporality::SlowlyDecaying,
                abstraction: "concrete".to_string(),
                source_type: "extraction".to_string(),
                initial_confidence: confidence,
                current_confidence: confidence,
                state: ClaimState::Active,
                emotional_valence: 0.0,
                emotional_intensity: claim.importance.unwrap_or(0.0),
                stakes: stakes_from_importance(claim.importance.unwrap_or(0.0)),
                valid_from: now,
                valid_until: None,
                created_at: now,
                last_confirmed: now,
                confirmation_count: 0,
                extraction_program_id: self.active_program.clone(),
                superseded_by: None,
                elaborates: None,
                memory_tier: MemoryTier::Working,
                salience: 0.0,
                promoted_at: None,
                last_accessed: now,
            };
            self.store.create_claim(&record, &unit.id)?;
            claim_ids.push(record.id);
        }

        let mut goal_ids = Vec::new();
        let existing_goals = self.store.get_active_goals()?;
        for goal in &normalized.goals {
            if let Some(matched) = find_fuzzy_goal(&existing_goals, &goal.statement) {
                let mut updated = matched.clone();
                updated.last_referenced = now;
                self.store.update_goal(&updated)?;
                goal_ids.push(updated.id);
                continue;
            }
            let record = Goal {
                id: Id::new(),
                statement: goal.statement.clone(),
                goal_type: goal.goal_type.clone(),
                timeframe: Timeframe::MediumTerm,
                status: GoalStatus::Active,
                parent_goal_id: None,
                created_at: now,
                last_referenced: now,
                priority: 50,
                progress_type: ProgressType::Binary,
                progress_value: 0.0,
                milestones: vec![],
                blockers: vec![],
                source_claim_id: claim_ids.first().cloned().unwrap_or_else(Id::new),
                motivation: None,
                deadline: None,
            };
            self.store.create_goal(&record)?;
            goal_ids.push(record.id);
        }

        let mut correction_ids = Vec::new();
        for correction in &normalized.corrections {
            let learned = self.correction_service.learn_explicit(&self.store, &correction.wrong, &correction.correct, Some(&unit.id))?;
            correction_ids.push(learned.id);
        }

        Ok(PipelineOutput {
            propositions: vec![proposition.id],
            stances: vec![stance.id],
            claims: claim_ids,
            entities: entity_ids,
            goals: goal_ids,
            corrections: correction_ids,
            extractors_run: vec![self.active_program.clone()],
            processing_time_ms,
            repaired,
        })
    }
}

fn stakes_from_importance(importance: f64) -> Stakes {
    if importance >= 0.75 {
        Stakes::Existential
    } else if importance >= 0.5 {
        Stakes::High
    } else if importance >= 0.25 {
        Stakes::Medium
    } else {
        Stakes::Low
    }
}

/// Match an existing active goal by normalized-Levenshtein similarity
/// against `statement`, using the same 0.3 distance threshold the
/// correction service's fuzzy matching uses.
fn find_fuzzy_goal<'a>(goals: &'a [Goal], statement: &str) -> Option<&'a Goal> {
    const THRESHOLD: f64 = 0.3;
    goals
        .iter()
        .map(|g| (g, 1.0 - strsim::normalized_levenshtein(&g.statement.to_lowercase(), &statement.to_lowercase())))
        .filter(|(_, distance)| *distance <= THRESHOLD)
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(g, _)| g)
}

fn build_system_prompt(context: &str, hints: &str) -> String {
    let mut prompt = String::from(
        "You extract structured knowledge from one utterance of a conversation. \
Return a single JSON object with the fields entities[], topics[], memories[], goals[], corrections[]. \
Each array entry may be a bare string or an object with named fields. Do not include any text outside the JSON object.\n\n",
    );
    prompt.push_str(context);
    if !hints.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(hints);
    }
    prompt
}

/// Payload shape for the `extract_from_unit` task.
#[derive(Debug, Serialize, Deserialize)]
struct ExtractPayload {
    unit_id: String,
}

/// Wraps `ExtractionPipeline` as a `ramble-queue` task handler. Each
/// `execute` call advances one checkpointed stage; the runner saves the
/// returned checkpoint and calls `execute` again immediately, so a crash
/// mid-run resumes at the saved stage on stale-task recovery instead of
/// repeating the LLM call.
pub struct ExtractFromUnitHandler {
    pipeline: Arc<ExtractionPipeline>,
}

impl ExtractFromUnitHandler {
    pub fn new(pipeline: Arc<ExtractionPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl TaskHandler for ExtractFromUnitHandler {
    async fn execute(
        &self,
        payload: &serde_json::Value,
        checkpoint: Option<&ramble_core::Checkpoint>,
    ) -> std::result::Result<TaskOutcome, anyhow::Error> {
        let parsed: ExtractPayload = serde_json::from_value(payload.clone())?;
        let unit_id = Id::from(parsed.unit_id.as_str());
        match self.pipeline.run(&unit_id, checkpoint).await? {
            PipelineStep::Progress(checkpoint) => Ok(TaskOutcome::Progress(checkpoint)),
            PipelineStep::Done(output) => {
                info!(unit_id = %unit_id, claims = output.claims.len(), entities = output.entities.len(), "unit extraction complete");
                Ok(TaskOutcome::Done(json!(output)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ramble_test_support::{persisted_session, sample_unit, temp_store, ScriptedLlmClient};

    use super::*;

    fn model() -> ModelConfig {
        ModelConfig {
            provider: "test".to_string(),
            model_id: "test".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 512,
            temperature: 0.3,
        }
    }

    /// Drives `run` stage by stage, as the queue runner does, returning
    /// the final output plus how many stages it took.
    async fn run_to_completion(pipeline: &ExtractionPipeline, unit_id: &Id) -> Result<(PipelineOutput, u32)> {
        let mut checkpoint: Option<Checkpoint> = None;
        loop {
            match pipeline.run(unit_id, checkpoint.as_ref()).await? {
                PipelineStep::Progress(next) => checkpoint = Some(next),
                PipelineStep::Done(output) => {
                    let stages = checkpoint.map(|c| c.step_index).unwrap_or(0);
                    return Ok((output, stages));
                }
            }
        }
    }

    #[tokio::test]
    async fn run_persists_entities_claims_and_goals_from_one_extraction() {
        let store = temp_store();
        let session = persisted_session(&store);
        let unit = sample_unit(&session.id, "I want to ship the rewrite by friday, working with Dana.");
        store.create_unit(&unit).unwrap();

        let llm = Arc::new(ScriptedLlmClient::always_returning(
            r#"{"entities":["Dana"],"topics":["the rewrite"],"goals":[{"statement":"ship the rewrite","goal_type":"project"}],"corrections":[]}"#,
        ));
        let pipeline = ExtractionPipeline::new(store.clone(), llm, model(), &AppConfig::default());

        let (output, stages) = run_to_completion(&pipeline, &unit.id).await.unwrap();

        assert_eq!(stages, 5);
        assert_eq!(output.entities.len(), 1);
        assert_eq!(output.claims.len(), 1);
        assert_eq!(output.goals.len(), 1);
        assert!(!output.repaired);
        assert!(store.get_unit(&unit.id).unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn run_reuses_a_fuzzy_matching_existing_goal_instead_of_duplicating() {
        let store = temp_store();
        let session = persisted_session(&store);
        let unit = sample_unit(&session.id, "still trying to ship the rewrite");
        store.create_unit(&unit).unwrap();

        let existing = ramble_test_support::sample_goal("ship the rewrite", &Id::new());
        store.create_goal(&existing).unwrap();

        let llm = Arc::new(ScriptedLlmClient::always_returning(
            r#"{"entities":[],"topics":[],"goals":[{"statement":"ship the rewrite","goal_type":"project"}],"corrections":[]}"#,
        ));
        let pipeline = ExtractionPipeline::new(store.clone(), llm, model(), &AppConfig::default());

        let (output, _) = run_to_completion(&pipeline, &unit.id).await.unwrap();

        assert_eq!(output.goals, vec![existing.id]);
        assert_eq!(store.get_active_goals().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn run_errors_when_the_llm_returns_no_parseable_json() {
        let store = temp_store();
        let session = persisted_session(&store);
        let unit = sample_unit(&session.id, "garbled response incoming");
        store.create_unit(&unit).unwrap();

        let llm = Arc::new(ScriptedLlmClient::always_returning("not json at all"));
        let pipeline = ExtractionPipeline::new(store.clone(), llm, model(), &AppConfig::default());

        let result = run_to_completion(&pipeline, &unit.id).await;

        assert!(result.is_err());
        assert!(store.get_unit(&unit.id).unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn resuming_from_a_post_llm_checkpoint_does_not_call_the_llm_again() {
        let store = temp_store();
        let session = persisted_session(&store);
        let unit = sample_unit(&session.id, "I want to ship the rewrite, working with Dana.");
        store.create_unit(&unit).unwrap();

        let llm = Arc::new(ScriptedLlmClient::always_returning(
            r#"{"entities":["Dana"],"topics":[],"goals":[],"corrections":[]}"#,
        ));
        let pipeline = ExtractionPipeline::new(store.clone(), llm.clone(), model(), &AppConfig::default());

        let mut checkpoint: Option<Checkpoint> = None;
        for _ in 0..3 {
            match pipeline.run(&unit.id, checkpoint.as_ref()).await.unwrap() {
                PipelineStep::Progress(next) => checkpoint = Some(next),
                PipelineStep::Done(_) => panic!("should not finish in three stages"),
            }
        }
        let after_llm = checkpoint.expect("checkpoint after the llm stage");
        assert_eq!(after_llm.step, "llm");
        let calls_after_llm_stage = llm.call_count();

        loop {
            match pipeline.run(&unit.id, Some(&after_llm)).await.unwrap() {
                PipelineStep::Progress(next) => checkpoint = Some(next),
                PipelineStep::Done(output) => {
                    assert_eq!(output.entities.len(), 1);
                    break;
                }
            }
        }
        assert_eq!(llm.call_count(), calls_after_llm_stage);
    }
}
