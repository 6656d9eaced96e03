//! The typed knowledge-graph data model. Every entity kind the
//! Store persists is defined here so that `ramble-store`, `ramble-queue`,
//! `ramble-goals`, `ramble-memory`, `ramble-observer`, and `ramble-pipeline`
//! share one definition instead of duplicating row shapes per crate.

use serde::{Deserialize, Serialize};

use crate::ids::{Id, Millis};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Id,
    pub started_at: Millis,
    pub ended_at: Option<Millis>,
    pub unit_count: u32,
    pub summary: Option<String>,
    pub mood_trajectory: Option<String>,
}

// ---------------------------------------------------------------------------
// ConversationUnit (Layer 0)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Speech,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscourseFunction {
    Assert,
    Question,
    Command,
    Express,
    Commit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationUnit {
    pub id: Id,
    pub session_id: Id,
    pub timestamp: Millis,
    pub raw_text: String,
    pub sanitized_text: String,
    pub source: Source,
    pub speaker: Speaker,
    pub discourse_function: DiscourseFunction,
    pub preceding_context_summary: Option<String>,
    pub created_at: Millis,
    pub processed: bool,
}

// ---------------------------------------------------------------------------
// Layer 1 primitives: Proposition / Stance / Span / EntityMention
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposition {
    pub id: Id,
    pub unit_id: Id,
    pub tokens: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attitude {
    Asserted,
    Denied,
    Hypothetical,
    Questioned,
    Desired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stance {
    pub id: Id,
    pub proposition_id: Id,
    pub attitude: Attitude,
    pub intensity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub id: Id,
    pub unit_id: Id,
    pub char_start: u32,
    pub char_end: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMention {
    pub id: Id,
    pub entity_id: Id,
    pub span_id: Id,
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Temporality {
    Eternal,
    SlowlyDecaying,
    FastDecaying,
    PointInTime,
}

impl Temporality {
    /// Half-life used by the recency term of the salience formula.
    /// `None` for `Eternal`, whose recency factor is always 1.
    pub fn half_life_secs(self) -> Option<i64> {
        match self {
            Temporality::Eternal => None,
            Temporality::SlowlyDecaying => Some(30 * 24 * 3_600),
            Temporality::FastDecaying => Some(24 * 3_600),
            Temporality::PointInTime => Some(3_600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimState {
    Active,
    Stale,
    Dormant,
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stakes {
    Low,
    Medium,
    High,
    Existential,
}

impl Stakes {
    /// Weight used by the salience formula.
    pub fn weight(self) -> f64 {
        match self {
            Stakes::Low => 0.25,
            Stakes::Medium => 0.5,
            Stakes::High => 0.75,
            Stakes::Existential => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MemoryTier {
    Working,
    LongTerm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: Id,
    pub statement: String,
    pub subject: String,
    pub claim_type: String,
    pub temporality: Temporality,
    pub abstraction: String,
    pub source_type: String,
    pub initial_confidence: f64,
    pub current_confidence: f64,
    pub state: ClaimState,
    pub emotional_valence: f64,
    pub emotional_intensity: f64,
    pub stakes: Stakes,
    pub valid_from: Millis,
    pub valid_until: Option<Millis>,
    pub created_at: Millis,
    pub last_confirmed: Millis,
    pub confirmation_count: u32,
    pub extraction_program_id: String,
    pub superseded_by: Option<Id>,
    pub elaborates: Option<Id>,
    pub memory_tier: MemoryTier,
    pub salience: f64,
    pub promoted_at: Option<Millis>,
    pub last_accessed: Millis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimSource {
    pub claim_id: Id,
    pub unit_id: Id,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Id,
    pub canonical_name: String,
    pub entity_type: String,
    pub aliases: Vec<String>,
    pub mention_count: u32,
    pub first_mentioned: Millis,
    pub last_referenced: Millis,
}

// ---------------------------------------------------------------------------
// Goal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Timeframe {
    Immediate,
    ShortTerm,
    MediumTerm,
    LongTerm,
    Life,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Achieved,
    Abandoned,
    Blocked,
    Dormant,
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressType {
    Continuous,
    Binary,
    Milestone,
    Percentage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: Id,
    pub description: String,
    pub achieved: bool,
    pub achieved_at: Option<Millis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockerSeverity {
    Blocking,
    Advisory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockerStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    pub id: Id,
    pub description: String,
    pub severity: BlockerSeverity,
    pub status: BlockerStatus,
    pub created_at: Millis,
    pub resolved_at: Option<Millis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Id,
    pub statement: String,
    pub goal_type: String,
    pub timeframe: Timeframe,
    pub status: GoalStatus,
    pub parent_goal_id: Option<Id>,
    pub created_at: Millis,
    pub last_referenced: Millis,
    pub priority: u8,
    pub progress_type: ProgressType,
    pub progress_value: f64,
    pub milestones: Vec<Milestone>,
    pub blockers: Vec<Blocker>,
    pub source_claim_id: Id,
    pub motivation: Option<String>,
    pub deadline: Option<Millis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalProgressUpdate {
    pub id: Id,
    pub goal_id: Id,
    pub value: f64,
    pub reason: String,
    pub evidence_claim_id: Option<Id>,
    pub created_at: Millis,
}

// ---------------------------------------------------------------------------
// Correction / Vocabulary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub id: Id,
    pub wrong_text: String,
    pub correct_text: String,
    pub original_case: String,
    pub usage_count: u32,
    pub created_at: Millis,
    pub last_used: Millis,
    pub source_unit_id: Option<Id>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    pub id: Id,
    pub correct_spelling: String,
    pub entity_type: String,
    pub context_hints: Vec<String>,
    pub phonetic_primary: String,
    pub phonetic_secondary: Option<String>,
    pub usage_count: u32,
    pub variant_counts: std::collections::HashMap<String, u32>,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Critical,
    High,
    Normal,
    Low,
}

impl TaskPriority {
    /// Numeric weight used for ordering.
    pub fn value(self) -> i32 {
        match self {
            TaskPriority::Critical => 100,
            TaskPriority::High => 75,
            TaskPriority::Normal => 50,
            TaskPriority::Low => 25,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub step: String,
    pub step_index: u32,
    pub total_steps: Option<u32>,
    pub intermediate_data: Option<serde_json::Value>,
    pub completed_steps: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter_factor: f64,
}

impl BackoffConfig {
    pub fn default_spec() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            jitter_factor: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Id,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub priority_value: i32,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub next_retry_at: Option<Millis>,
    pub backoff_config: BackoffConfig,
    pub checkpoint: Option<Checkpoint>,
    pub created_at: Millis,
    pub started_at: Option<Millis>,
    pub completed_at: Option<Millis>,
    pub execute_at: Millis,
    pub group_id: Option<String>,
    pub depends_on: Option<Id>,
    pub session_id: Option<Id>,
}

// ---------------------------------------------------------------------------
// Observer outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverOutput {
    pub id: Id,
    pub observer_name: String,
    pub kind: String,
    pub content: String,
    pub source_claim_ids: Vec<Id>,
    pub created_at: Millis,
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    pub id: Id,
    pub claim_a_id: Id,
    pub claim_b_id: Id,
    pub explanation: String,
    pub created_at: Millis,
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: Id,
    pub description: String,
    pub source_claim_ids: Vec<Id>,
    pub created_at: Millis,
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    pub id: Id,
    pub statement: String,
    pub source_claim_ids: Vec<Id>,
    pub created_at: Millis,
    pub stale: bool,
}

// ---------------------------------------------------------------------------
// Program records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionProgramRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverProgramRecord {
    pub id: String,
    pub name: String,
    pub success_rate: f64,
    pub active: bool,
}

// ---------------------------------------------------------------------------
// SynthesisCache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisCache {
    pub id: Id,
    pub synthesis_type: String,
    pub cache_key: String,
    pub content: String,
    pub source_claims: Vec<Id>,
    pub created_at: Millis,
    pub stale: bool,
    pub ttl_seconds: u64,
}

impl SynthesisCache {
    /// Valid iff not stale, not expired, and no source claim was
    /// re-confirmed after this entry was cached.
    pub fn is_valid(&self, now: Millis, source_claims_last_confirmed: &[Millis]) -> bool {
        if self.stale {
            return false;
        }
        if now - self.created_at >= (self.ttl_seconds as i64) * 1000 {
            return false;
        }
        !source_claims_last_confirmed
            .iter()
            .any(|&lc| lc > self.created_at)
    }
}
