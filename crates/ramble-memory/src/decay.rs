use serde::{Deserialize, Serialize};

use ramble_core::{now_millis, ClaimState, MemoryConfig, MemoryTier, Temporality};
use ramble_store::Store;

use crate::error::Result;
use crate::salience::{compute_salience, recency};

/// Outcome of one `decay_claims` pass.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DecayReport {
    pub processed_count: usize,
    pub decayed_count: usize,
    pub stale_count: usize,
    pub dormant_count: usize,
    pub promoted_count: usize,
    pub errors: Vec<String>,
}

/// Recomputes confidence and salience for every non-eternal, non-superseded
/// claim, transitions state on threshold crossing, then promotes any
/// `working` claim at or above `promotionThreshold`. Safe to call directly
/// (tests) or from the scheduled task handler.
pub fn decay_claims(store: &Store, config: &MemoryConfig) -> Result<DecayReport> {
    let now = now_millis();
    let mut report = DecayReport::default();

    let claims = store.get_all_claims()?;
    for mut claim in claims {
        if claim.temporality == Temporality::Eternal || claim.state == ClaimState::Superseded {
            continue;
        }
        report.processed_count += 1;

        let recency_factor = recency(&claim, now);
        let new_confidence = claim.initial_confidence * recency_factor;
        let new_salience = compute_salience(&claim, now, config);

        let changed = (new_confidence - claim.current_confidence).abs() > f64::EPSILON
            || (new_salience - claim.salience).abs() > f64::EPSILON;
        if changed {
            report.decayed_count += 1;
        }
        claim.current_confidence = new_confidence;
        claim.salience = new_salience;

        // long-term claims still decay confidence/salience but are exempt
        // from the stale/dormant transitions.
        if claim.memory_tier == MemoryTier::Working {
            if new_confidence < config.dormant_threshold {
                claim.state = ClaimState::Dormant;
                report.dormant_count += 1;
            } else if new_confidence < config.stale_threshold {
                claim.state = ClaimState::Stale;
                report.stale_count += 1;
            }
        }

        if claim.memory_tier == MemoryTier::Working && claim.salience >= config.promotion_threshold {
            claim.memory_tier = MemoryTier::LongTerm;
            claim.promoted_at = Some(now);
            report.promoted_count += 1;
        }

        if let Err(e) = store.update_claim(&claim) {
            report.errors.push(format!("claim {}: {e}", claim.id.as_str()));
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramble_core::{Id, Stakes};

    fn insert_claim(store: &Store, temporality: Temporality, confidence: f64, last_confirmed: i64) -> Id {
        let now = now_millis();
        let unit_id = Id::new();
        store
            .create_unit(&ramble_core::ConversationUnit {
                id: unit_id.clone(),
                session_id: Id::new(),
                timestamp: now,
                raw_text: "test".to_string(),
                sanitized_text: "test".to_string(),
                source: ramble_core::Source::Text,
                speaker: ramble_core::Speaker::User,
                discourse_function: ramble_core::DiscourseFunction::Assert,
                preceding_context_summary: None,
                created_at: now,
                processed: false,
            })
            .unwrap();

        let claim = ramble_core::Claim {
            id: Id::new(),
            statement: "claim".to_string(),
            subject: "claim".to_string(),
            claim_type: "fact".to_string(),
            temporality,
            abstraction: "concrete".to_string(),
            source_type: "extraction".to_string(),
            initial_confidence: confidence,
            current_confidence: confidence,
            state: ClaimState::Active,
            emotional_valence: 0.0,
            emotional_intensity: 0.0,
            stakes: Stakes::Medium,
            valid_from: now,
            valid_until: None,
            created_at: now,
            last_confirmed,
            confirmation_count: 0,
            extraction_program_id: "test".to_string(),
            superseded_by: None,
            elaborates: None,
            memory_tier: MemoryTier::Working,
            salience: 0.0,
            promoted_at: None,
            last_accessed: now,
        };
        store.create_claim(&claim, &unit_id).unwrap();
        claim.id
    }

    #[test]
    fn decay_transitions_fast_decaying_claim_to_stale_then_dormant() {
        let store = Store::in_memory("default").unwrap();
        let day_ms = 24 * 3_600 * 1000;
        let id = insert_claim(&store, Temporality::FastDecaying, 1.0, now_millis() - 3 * day_ms);

        let config = MemoryConfig::default();
        decay_claims(&store, &config).unwrap();
        let claim = store.get_claim(&id).unwrap().unwrap();
        assert!((claim.current_confidence - 0.125).abs() < 1e-3);
        assert_eq!(claim.state, ClaimState::Stale);
    }

    #[test]
    fn eternal_claims_are_skipped() {
        let store = Store::in_memory("default").unwrap();
        let id = insert_claim(&store, Temporality::Eternal, 1.0, 0);
        let config = MemoryConfig::default();
        let report = decay_claims(&store, &config).unwrap();
        assert_eq!(report.processed_count, 0);
        let claim = store.get_claim(&id).unwrap().unwrap();
        assert_eq!(claim.current_confidence, 1.0);
    }

    #[test]
    fn promotion_is_one_way() {
        let store = Store::in_memory("default").unwrap();
        let id = insert_claim(&store, Temporality::Eternal, 1.0, 0);
        let mut claim = store.get_claim(&id).unwrap().unwrap();
        claim.memory_tier = MemoryTier::LongTerm;
        claim.promoted_at = Some(now_millis());
        store.update_claim(&claim).unwrap();

        let config = MemoryConfig::default();
        decay_claims(&store, &config).unwrap();
        let after = store.get_claim(&id).unwrap().unwrap();
        assert_eq!(after.memory_tier, MemoryTier::LongTerm);
    }
}
