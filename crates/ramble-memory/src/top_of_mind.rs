use serde::{Deserialize, Serialize};

use ramble_core::{Claim, Entity, Goal, MemoryConfig};
use ramble_store::Store;

use crate::error::Result;

/// Bounded snapshot of what the conversation is "about" right now.
/// Each list is sorted by its own salience-like ranking and trimmed to
/// `topOfMindLimit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopOfMind {
    pub topics: Vec<Claim>,
    pub entities: Vec<Entity>,
    pub goals: Vec<Goal>,
    pub concerns: Vec<Claim>,
    pub open_questions: Vec<Claim>,
    pub recent_high_intensity: Vec<Claim>,
}

pub fn top_of_mind(store: &Store, config: &MemoryConfig) -> Result<TopOfMind> {
    let limit = config.top_of_mind_limit;
    let claims = store.get_active_claims()?;

    let mut topics = filter_by_type(&claims, "topic");
    sort_by_salience_desc(&mut topics);
    topics.truncate(limit);

    let mut concerns = filter_by_type(&claims, "concern");
    sort_by_salience_desc(&mut concerns);
    concerns.truncate(limit);

    let mut open_questions = filter_by_type(&claims, "open_question");
    sort_by_salience_desc(&mut open_questions);
    open_questions.truncate(limit);

    let mut recent_high_intensity = claims.clone();
    recent_high_intensity.sort_by(|a, b| {
        b.emotional_intensity
            .partial_cmp(&a.emotional_intensity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    recent_high_intensity.truncate(limit);

    let mut entities = store.get_all_entities()?;
    entities.sort_by(|a, b| b.last_referenced.cmp(&a.last_referenced));
    entities.truncate(limit);

    let mut goals = store.get_active_goals()?;
    goals.sort_by(|a, b| b.priority.cmp(&a.priority));
    goals.truncate(limit);

    Ok(TopOfMind { topics, entities, goals, concerns, open_questions, recent_high_intensity })
}

fn filter_by_type(claims: &[Claim], claim_type: &str) -> Vec<Claim> {
    claims.iter().filter(|c| c.claim_type == claim_type).cloned().collect()
}

fn sort_by_salience_desc(claims: &mut [Claim]) {
    claims.sort_by(|a, b| b.salience.partial_cmp(&a.salience).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_of_mind_trims_to_configured_limit() {
        let store = Store::in_memory("default").unwrap();
        let mut config = MemoryConfig::default();
        config.top_of_mind_limit = 2;

        for i in 0..5 {
            let unit_id = ramble_core::Id::new();
            let now = ramble_core::now_millis();
            store
                .create_unit(&ramble_core::ConversationUnit {
                    id: unit_id.clone(),
                    session_id: ramble_core::Id::new(),
                    timestamp: now,
                    raw_text: "x".to_string(),
                    sanitized_text: "x".to_string(),
                    source: ramble_core::Source::Text,
                    speaker: ramble_core::Speaker::User,
                    discourse_function: ramble_core::DiscourseFunction::Assert,
                    preceding_context_summary: None,
                    created_at: now,
                    processed: false,
                })
                .unwrap();
            let claim = ramble_core::Claim {
                id: ramble_core::Id::new(),
                statement: format!("topic {i}"),
                subject: format!("topic {i}"),
                claim_type: "topic".to_string(),
                temporality: ramble_core::Temporality::Eternal,
                abstraction: "concrete".to_string(),
                source_type: "extraction".to_string(),
                initial_confidence: 1.0,
                current_confidence: 1.0,
                state: ramble_core::ClaimState::Active,
                emotional_valence: 0.0,
                emotional_intensity: 0.0,
                stakes: ramble_core::Stakes::Medium,
                valid_from: now,
                valid_until: None,
                created_at: now,
                last_confirmed: now,
                confirmation_count: 0,
                extraction_program_id: "test".to_string(),
                superseded_by: None,
                elaborates: None,
                memory_tier: ramble_core::MemoryTier::Working,
                salience: i as f64 / 10.0,
                promoted_at: None,
                last_accessed: now,
            };
            store.create_claim(&claim, &unit_id).unwrap();
        }

        let config2 = config;
        let result = top_of_mind(&store, &config2).unwrap();
        assert_eq!(result.topics.len(), 2);
        assert!(result.topics[0].salience >= result.topics[1].salience);
    }
}
