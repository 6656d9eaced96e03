use std::collections::HashMap;

use futures::future::BoxFuture;

use ramble_core::{now_millis, Id};

use crate::observer::{Observer, ObserverContext, ObserverOutputKind};
use crate::trigger::{ObserverConfig, Trigger};

/// Flags two `active` claims about the same subject whose emotional
/// valence points in opposite directions — a cheap proxy for "asserts
/// and denies the same thing" without a dedicated stance link on
/// `Claim`.
pub struct ContradictionObserver;

impl Observer for ContradictionObserver {
    fn config(&self) -> ObserverConfig {
        ObserverConfig {
            observer_type: "contradiction".to_string(),
            name: "contradiction".to_string(),
            description: "Flags claims about the same subject with opposing valence".to_string(),
            triggers: vec![Trigger::NewClaim],
            priority: 100,
            claim_type_filter: None,
            uses_llm: false,
        }
    }

    fn execute<'a>(&'a self, ctx: &'a ObserverContext) -> BoxFuture<'a, anyhow::Result<Vec<ObserverOutputKind>>> {
        Box::pin(async move {
            let mut outputs = Vec::new();
            for new_claim in &ctx.new_claims {
                for other in &ctx.new_claims {
                    if new_claim.id == other.id {
                        continue;
                    }
                    if new_claim.subject != other.subject {
                        continue;
                    }
                    let opposing = (new_claim.emotional_valence > 0.2 && other.emotional_valence < -0.2)
                        || (new_claim.emotional_valence < -0.2 && other.emotional_valence > 0.2);
                    if opposing {
                        outputs.push(ObserverOutputKind::Contradiction(ramble_core::Contradiction {
                            id: Id::new(),
                            claim_a_id: new_claim.id.clone(),
                            claim_b_id: other.id.clone(),
                            explanation: format!(
                                "\"{}\" and \"{}\" both concern \"{}\" with opposing valence",
                                new_claim.statement, other.statement, new_claim.subject
                            ),
                            created_at: now_millis(),
                            stale: false,
                        }));
                    }
                }
            }
            Ok(outputs)
        })
    }
}

/// Flags subjects with at least three cumulative confirmations across
/// claims sharing a `claimType` + `subject` as a recurring `Pattern`.
pub struct PatternObserver;

const PATTERN_THRESHOLD: u32 = 3;

impl Observer for PatternObserver {
    fn config(&self) -> ObserverConfig {
        ObserverConfig {
            observer_type: "pattern".to_string(),
            name: "pattern".to_string(),
            description: "Flags repeated confirmation of the same claim type and subject".to_string(),
            triggers: vec![Trigger::NewClaim],
            priority: 50,
            claim_type_filter: None,
            uses_llm: false,
        }
    }

    fn execute<'a>(&'a self, ctx: &'a ObserverContext) -> BoxFuture<'a, anyhow::Result<Vec<ObserverOutputKind>>> {
        Box::pin(async move {
            let mut groups: HashMap<(String, String), (u32, Vec<Id>)> = HashMap::new();
            for claim in &ctx.new_claims {
                let key = (claim.claim_type.clone(), claim.subject.clone());
                let entry = groups.entry(key).or_insert((0, Vec::new()));
                entry.0 += 1 + claim.confirmation_count;
                entry.1.push(claim.id.clone());
            }

            let mut outputs = Vec::new();
            for ((claim_type, subject), (count, ids)) in groups {
                if count >= PATTERN_THRESHOLD {
                    outputs.push(ObserverOutputKind::Pattern(ramble_core::Pattern {
                        id: Id::new(),
                        description: format!("Repeated {claim_type} claims about \"{subject}\" ({count} confirmations)"),
                        source_claim_ids: ids,
                        created_at: now_millis(),
                        stale: false,
                    }));
                }
            }
            Ok(outputs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramble_core::{Claim, ClaimState, MemoryTier, Stakes, Temporality};

    fn claim(id: &str, subject: &str, claim_type: &str, valence: f64, confirmations: u32) -> Claim {
        let now = now_millis();
        Claim {
            id: Id::from(id),
            statement: format!("statement about {subject}"),
            subject: subject.to_string(),
            claim_type: claim_type.to_string(),
            temporality: Temporality::SlowlyDecaying,
            abstraction: "concrete".to_string(),
            source_type: "extraction".to_string(),
            initial_confidence: 0.5,
            current_confidence: 0.5,
            state: ClaimState::Active,
            emotional_valence: valence,
            emotional_intensity: valence.abs(),
            stakes: Stakes::Medium,
            valid_from: now,
            valid_until: None,
            created_at: now,
            last_confirmed: now,
            confirmation_count: confirmations,
            extraction_program_id: "test".to_string(),
            superseded_by: None,
            elaborates: None,
            memory_tier: MemoryTier::Working,
            salience: 0.0,
            promoted_at: None,
            last_accessed: now,
        }
    }

    #[tokio::test]
    async fn contradiction_observer_flags_opposing_valence() {
        let ctx = ObserverContext {
            new_claims: vec![claim("a", "coffee", "preference", 0.8, 0), claim("b", "coffee", "preference", -0.8, 0)],
            session_id: None,
            timestamp: now_millis(),
        };
        let outputs = ContradictionObserver.execute(&ctx).await.unwrap();
        assert_eq!(outputs.len(), 2); // symmetric pair, both directions recorded
    }

    #[tokio::test]
    async fn contradiction_observer_ignores_same_direction_valence() {
        let ctx = ObserverContext {
            new_claims: vec![claim("a", "coffee", "preference", 0.8, 0), claim("b", "coffee", "preference", 0.6, 0)],
            session_id: None,
            timestamp: now_millis(),
        };
        let outputs = ContradictionObserver.execute(&ctx).await.unwrap();
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn pattern_observer_flags_at_threshold() {
        let ctx = ObserverContext {
            new_claims: vec![
                claim("a", "work", "goal", 0.0, 1),
                claim("b", "work", "goal", 0.0, 1),
            ],
            session_id: None,
            timestamp: now_millis(),
        };
        let outputs = PatternObserver.execute(&ctx).await.unwrap();
        assert_eq!(outputs.len(), 1);
    }

    #[tokio::test]
    async fn pattern_observer_ignores_below_threshold() {
        let ctx = ObserverContext {
            new_claims: vec![claim("a", "work", "goal", 0.0, 0)],
            session_id: None,
            timestamp: now_millis(),
        };
        let outputs = PatternObserver.execute(&ctx).await.unwrap();
        assert!(outputs.is_empty());
    }
}
