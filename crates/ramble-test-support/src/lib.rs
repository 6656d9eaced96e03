//! Fixtures shared by the other crates' test suites: an in-memory `Store`,
//! a scripted `LlmClient` double, and builders for a minimally-valid
//! `ConversationUnit`/`Claim`/`Goal` so integration tests don't each
//! hand-roll the same sixteen-field struct literal.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use ramble_core::{
    now_millis, Attitude, Claim, ClaimState, ConversationUnit, DiscourseFunction, Goal, GoalStatus, Id,
    MemoryTier, ProgressType, Session, Source, Speaker, Stakes, Temporality, Timeframe,
};
use ramble_llm::{LlmClient, LlmError, LlmRequest, LlmResponse, Result as LlmResult};
use ramble_store::Store;

/// A fresh, empty in-memory store for tests that don't need file-backed
/// persistence or WAL durability across process restarts.
pub fn temp_store() -> Arc<Store> {
    Arc::new(Store::in_memory("test").expect("in-memory store always opens"))
}

pub fn sample_session() -> Session {
    let now = now_millis();
    Session { id: Id::new(), started_at: now, ended_at: None, unit_count: 0, summary: None, mood_trajectory: None }
}

/// Creates and persists a session, returning it — most fixtures need an
/// owning session id before they can create units or claims.
pub fn persisted_session(store: &Store) -> Session {
    let session = sample_session();
    store.create_session(&session).expect("create_session");
    session
}

pub fn sample_unit(session_id: &Id, text: &str) -> ConversationUnit {
    let now = now_millis();
    ConversationUnit {
        id: Id::new(),
        session_id: session_id.clone(),
        timestamp: now,
        raw_text: text.to_string(),
        sanitized_text: text.to_string(),
        source: Source::Text,
        speaker: Speaker::User,
        discourse_function: DiscourseFunction::Assert,
        preceding_context_summary: None,
        created_at: now,
        processed: false,
    }
}

/// A minimally-valid, currently-active, not-yet-decayed claim. Callers
/// override whichever fields their test cares about with struct-update
/// syntax: `Claim { subject: "rust".into(), ..sample_claim("x") }`.
pub fn sample_claim(statement: &str) -> Claim {
    let now = now_millis();
    Claim {
        id: Id::new(),
        statement: statement.to_string(),
        subject: statement.to_string(),
        claim_type: "fact".to_string(),
        temporality: Temporality::SlowlyDecaying,
        abstraction: "concrete".to_string(),
        source_type: "extraction".to_string(),
        initial_confidence: 0.8,
        current_confidence: 0.8,
        state: ClaimState::Active,
        emotional_valence: 0.0,
        emotional_intensity: 0.0,
        stakes: Stakes::Medium,
        valid_from: now,
        valid_until: None,
        created_at: now,
        last_confirmed: now,
        confirmation_count: 1,
        extraction_program_id: "test".to_string(),
        superseded_by: None,
        elaborates: None,
        memory_tier: MemoryTier::Working,
        salience: 0.5,
        promoted_at: None,
        last_accessed: now,
    }
}

pub fn sample_goal(statement: &str, source_claim_id: &Id) -> Goal {
    let now = now_millis();
    Goal {
        id: Id::new(),
        statement: statement.to_string(),
        goal_type: "aspiration".to_string(),
        timeframe: Timeframe::MediumTerm,
        status: GoalStatus::Active,
        parent_goal_id: None,
        created_at: now,
        last_referenced: now,
        priority: 50,
        progress_type: ProgressType::Continuous,
        progress_value: 0.0,
        milestones: Vec::new(),
        blockers: Vec::new(),
        source_claim_id: source_claim_id.clone(),
        motivation: None,
        deadline: None,
    }
}

pub fn sample_attitude_intensity() -> (Attitude, f64) {
    (Attitude::Asserted, 0.7)
}

/// An `LlmClient` double that replays a fixed sequence of responses in
/// order, erroring once the script runs out. Mirrors the `FlakyClient`
/// shape from `ramble-llm`'s own retry tests, generalized into a
/// cross-crate fixture for the extraction pipeline and observer tests.
pub struct ScriptedLlmClient {
    responses: Mutex<Vec<LlmResult<LlmResponse>>>,
    calls: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<LlmResult<LlmResponse>>) -> Self {
        Self { responses: Mutex::new(responses), calls: Mutex::new(Vec::new()) }
    }

    /// Convenience for the common case: every call succeeds with the same
    /// raw JSON-producing content.
    pub fn always_returning(content: impl Into<String>) -> Self {
        let content = content.into();
        Self::new(vec![Ok(LlmResponse { content, usage: None })])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl LlmClient for ScriptedLlmClient {
    fn call<'a>(&'a self, request: LlmRequest) -> BoxFuture<'a, LlmResult<LlmResponse>> {
        self.calls.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        let result = if responses.len() > 1 {
            responses.remove(0)
        } else if let Some(last) = responses.first() {
            clone_result(last)
        } else {
            Err(LlmError::Network("scripted client exhausted".to_string()))
        };
        Box::pin(async move { result })
    }
}

fn clone_result(result: &LlmResult<LlmResponse>) -> LlmResult<LlmResponse> {
    match result {
        Ok(response) => Ok(LlmResponse { content: response.content.clone(), usage: response.usage.clone() }),
        Err(e) => Err(LlmError::Network(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_client_replays_responses_in_order() {
        let client = ScriptedLlmClient::new(vec![
            Ok(LlmResponse { content: "first".to_string(), usage: None }),
            Ok(LlmResponse { content: "second".to_string(), usage: None }),
        ]);
        let request = LlmRequest {
            model: ramble_llm::ModelConfig {
                provider: "test".to_string(),
                model_id: "test".to_string(),
                api_key: None,
                base_url: None,
                max_tokens: 16,
                temperature: 0.0,
            },
            system_prompt: None,
            messages: Vec::new(),
        };
        let first = futures::executor::block_on(client.call(request.clone())).unwrap();
        let second = futures::executor::block_on(client.call(request.clone())).unwrap();
        let third = futures::executor::block_on(client.call(request)).unwrap();
        assert_eq!(first.content, "first");
        assert_eq!(second.content, "second");
        assert_eq!(third.content, "second");
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn sample_fixtures_persist_cleanly() {
        let store = temp_store();
        let session = persisted_session(&store);
        let unit = sample_unit(&session.id, "hello world");
        store.create_unit(&unit).unwrap();
        let claim = sample_claim("likes rust");
        store.create_claim(&claim, &unit.id).unwrap();
        let goal = sample_goal("ship the project", &claim.id);
        store.create_goal(&goal).unwrap();

        assert_eq!(store.get_unit(&unit.id).unwrap().unwrap().raw_text, "hello world");
        assert_eq!(store.get_active_claims().unwrap().len(), 1);
        assert_eq!(store.get_active_goals().unwrap().len(), 1);
    }
}
